// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Lexical analysis for Oxbow source code.
//!
//! The lexer is a cursor over the text plus an immutable registry of
//! matching rules, tried at each position in descending priority order:
//! multi-character fixed strings rank above single characters, which rank
//! above generic identifier/keyword scanning. The first rule that matches
//! consumes input and either emits a token or suppresses emission (used for
//! whitespace and `//` comments). If no rule matches, lexing fails with
//! [`LexErrorKind::UnexpectedCharacter`].
//!
//! The registry is assembled once per process and shared read-only across
//! compilations; the whole token sequence is produced up front (no
//! streaming), terminated by a single [`TokenKind::Eof`] at the final
//! offset.
//!
//! # Example
//!
//! ```
//! use oxbow_core::source_analysis::{lex, TokenKind};
//!
//! let tokens = lex("var x := 3.14").unwrap();
//! assert!(matches!(tokens[3].kind(), TokenKind::Real(_)));
//! assert!(tokens.last().unwrap().kind().is_eof());
//! ```

use std::sync::OnceLock;

use ecow::EcoString;
use tracing::debug;

use super::{LexError, LexErrorKind, Span, Token, TokenKind};

/// The fixed keyword table consulted after identifier scanning.
const KEYWORDS: [(&str, TokenKind); 21] = [
    ("class", TokenKind::Class),
    ("extends", TokenKind::Extends),
    ("is", TokenKind::Is),
    ("end", TokenKind::End),
    ("var", TokenKind::Var),
    ("method", TokenKind::Method),
    ("if", TokenKind::If),
    ("then", TokenKind::Then),
    ("elif", TokenKind::Elif),
    ("else", TokenKind::Else),
    ("while", TokenKind::While),
    ("loop", TokenKind::Loop),
    ("return", TokenKind::Return),
    ("break", TokenKind::Break),
    ("this", TokenKind::This),
    ("new", TokenKind::New),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
    ("and", TokenKind::And),
    ("or", TokenKind::Or),
    ("not", TokenKind::Not),
];

/// Two-character fixed tokens, matched before any single-character rule.
const TWO_CHAR: [(&str, TokenKind); 6] = [
    (":=", TokenKind::Assign),
    ("=>", TokenKind::FatArrow),
    ("<=", TokenKind::LessEqual),
    (">=", TokenKind::GreaterEqual),
    ("==", TokenKind::EqualEqual),
    ("!=", TokenKind::NotEqual),
];

/// Single-character fixed tokens.
const ONE_CHAR: [(char, TokenKind); 13] = [
    ('.', TokenKind::Dot),
    (',', TokenKind::Comma),
    ('(', TokenKind::LeftParen),
    (')', TokenKind::RightParen),
    ('[', TokenKind::LeftBracket),
    (']', TokenKind::RightBracket),
    ('+', TokenKind::Plus),
    ('-', TokenKind::Minus),
    ('*', TokenKind::Star),
    ('/', TokenKind::Slash),
    ('%', TokenKind::Percent),
    ('<', TokenKind::Less),
    ('>', TokenKind::Greater),
];

/// What a rule did at the current position.
enum RuleOutcome {
    /// The rule does not apply here; the cursor was not moved.
    NoMatch,
    /// Input was consumed but no token is emitted (whitespace, comments).
    Skip,
    /// Input was consumed and a token of this kind is emitted.
    Emit(TokenKind),
}

type RuleFn = fn(&mut Cursor<'_>) -> Result<RuleOutcome, LexError>;

/// A priority-ordered token-matching rule.
struct Rule {
    /// Higher priority is tried first.
    priority: u8,
    try_match: RuleFn,
}

/// The immutable rule registry, assembled once per process.
fn registry() -> &'static [Rule] {
    static REGISTRY: OnceLock<Vec<Rule>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| {
            let mut rules = vec![
                Rule {
                    priority: 50,
                    try_match: match_whitespace,
                },
                Rule {
                    priority: 45,
                    try_match: match_line_comment,
                },
                Rule {
                    priority: 40,
                    try_match: match_two_char,
                },
                Rule {
                    priority: 35,
                    try_match: match_number,
                },
                Rule {
                    priority: 30,
                    try_match: match_string,
                },
                Rule {
                    priority: 20,
                    try_match: match_one_char,
                },
                Rule {
                    priority: 10,
                    try_match: match_identifier_or_keyword,
                },
            ];
            rules.sort_by(|a, b| b.priority.cmp(&a.priority));
            rules
        })
        .as_slice()
}

/// A cursor over the source text tracking byte index, line, column and the
/// start of the current token.
struct Cursor<'src> {
    source: &'src str,
    pos: usize,
    line: u32,
    column: u32,
    /// `(pos, line, column)` where the current token started.
    mark: (usize, u32, u32),
}

impl<'src> Cursor<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
            mark: (0, 1, 1),
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// Peeks `n` characters ahead without consuming (`n = 0` is the next
    /// character).
    fn peek_n(&self, n: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(n)
    }

    fn peek(&self) -> Option<char> {
        self.peek_n(0)
    }

    /// Consumes one character, updating line and column.
    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Consumes characters while `predicate` holds.
    fn bump_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&predicate) {
            self.bump();
        }
    }

    /// Returns `true` and consumes `text` if the input starts with it.
    fn bump_if_str(&mut self, text: &str) -> bool {
        if self.source[self.pos..].starts_with(text) {
            for _ in text.chars() {
                self.bump();
            }
            true
        } else {
            false
        }
    }

    /// Remembers the current position as the start of the next token.
    fn set_mark(&mut self) {
        self.mark = (self.pos, self.line, self.column);
    }

    /// Span from the mark to the current position.
    fn span_from_mark(&self) -> Span {
        Span::from(self.mark.0..self.pos)
    }

    /// Source text from the mark to the current position.
    fn lexeme(&self) -> &'src str {
        &self.source[self.mark.0..self.pos]
    }

    /// Builds a lexical error located at the token mark.
    fn error_at_mark(&self, kind: LexErrorKind) -> LexError {
        LexError::new(kind, self.span_from_mark(), self.mark.1, self.mark.2)
    }

    /// Builds a lexical error at the current (not yet consumed) character.
    fn error_here(&self, kind: LexErrorKind) -> LexError {
        let len = self.peek().map_or(0, char::len_utf8);
        LexError::new(
            kind,
            Span::from(self.pos..self.pos + len),
            self.line,
            self.column,
        )
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn match_whitespace(cursor: &mut Cursor<'_>) -> Result<RuleOutcome, LexError> {
    if cursor.peek().is_some_and(char::is_whitespace) {
        cursor.bump_while(char::is_whitespace);
        Ok(RuleOutcome::Skip)
    } else {
        Ok(RuleOutcome::NoMatch)
    }
}

fn match_line_comment(cursor: &mut Cursor<'_>) -> Result<RuleOutcome, LexError> {
    if cursor.bump_if_str("//") {
        cursor.bump_while(|c| c != '\n');
        Ok(RuleOutcome::Skip)
    } else {
        Ok(RuleOutcome::NoMatch)
    }
}

fn match_two_char(cursor: &mut Cursor<'_>) -> Result<RuleOutcome, LexError> {
    for (text, kind) in TWO_CHAR {
        if cursor.bump_if_str(text) {
            return Ok(RuleOutcome::Emit(kind));
        }
    }
    Ok(RuleOutcome::NoMatch)
}

fn match_one_char(cursor: &mut Cursor<'_>) -> Result<RuleOutcome, LexError> {
    for (c, kind) in ONE_CHAR {
        if cursor.peek() == Some(c) {
            cursor.bump();
            return Ok(RuleOutcome::Emit(kind));
        }
    }
    Ok(RuleOutcome::NoMatch)
}

/// Numeric literals.
///
/// - `-` immediately followed by a digit starts a negative literal.
/// - `.` followed by a digit starts a real with no integer part.
/// - digits followed by `.` promote to real when the character after the
///   dot is a digit, or is anything other than a letter/underscore/digit
///   (so `3.` is a real but `3.field` leaves the dot alone).
fn match_number(cursor: &mut Cursor<'_>) -> Result<RuleOutcome, LexError> {
    let first = match cursor.peek() {
        Some(c) => c,
        None => return Ok(RuleOutcome::NoMatch),
    };

    let starts_number = first.is_ascii_digit()
        || (matches!(first, '-' | '.') && cursor.peek_n(1).is_some_and(|c| c.is_ascii_digit()));
    if !starts_number {
        return Ok(RuleOutcome::NoMatch);
    }

    if first == '-' {
        cursor.bump();
    }

    let mut is_real = false;
    if cursor.peek() == Some('.') {
        // Real with no integer part: .5
        is_real = true;
        cursor.bump();
        cursor.bump_while(|c| c.is_ascii_digit());
    } else {
        cursor.bump_while(|c| c.is_ascii_digit());
        if cursor.peek() == Some('.') {
            // `3.field` stays an integer; the dot lexes separately.
            let promotes = cursor
                .peek_n(1)
                .map_or(true, |c| c.is_ascii_digit() || !is_ident_start(c));
            if promotes {
                is_real = true;
                cursor.bump();
                cursor.bump_while(|c| c.is_ascii_digit());
            }
        }
    }

    let text = cursor.lexeme();
    let kind = if is_real {
        let value: f64 = text
            .parse()
            .map_err(|_| cursor.error_at_mark(LexErrorKind::InvalidNumber(text.into())))?;
        TokenKind::Real(value)
    } else {
        let value: i64 = text
            .parse()
            .map_err(|_| cursor.error_at_mark(LexErrorKind::InvalidNumber(text.into())))?;
        TokenKind::Integer(value)
    };
    Ok(RuleOutcome::Emit(kind))
}

/// String literals with escapes `\" \\ \n \r \t \0` and `\xHH`.
///
/// A raw newline or end-of-input before the closing quote is fatal.
fn match_string(cursor: &mut Cursor<'_>) -> Result<RuleOutcome, LexError> {
    if cursor.peek() != Some('"') {
        return Ok(RuleOutcome::NoMatch);
    }
    cursor.bump(); // opening quote

    let mut value = String::new();
    loop {
        match cursor.peek() {
            None | Some('\n') => {
                return Err(cursor.error_at_mark(LexErrorKind::UnterminatedString));
            }
            Some('"') => {
                cursor.bump();
                return Ok(RuleOutcome::Emit(TokenKind::Str(EcoString::from(value))));
            }
            Some('\\') => {
                cursor.bump();
                match cursor.peek() {
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('t') => value.push('\t'),
                    Some('0') => value.push('\0'),
                    Some('x') => {
                        cursor.bump(); // x
                        let mut byte = 0u8;
                        for _ in 0..2 {
                            let digit = cursor
                                .peek()
                                .and_then(|c| c.to_digit(16))
                                .ok_or_else(|| cursor.error_here(LexErrorKind::InvalidHexEscape))?;
                            #[allow(clippy::cast_possible_truncation)]
                            {
                                byte = byte * 16 + digit as u8;
                            }
                            cursor.bump();
                        }
                        value.push(byte as char);
                        continue;
                    }
                    Some(other) => {
                        return Err(cursor.error_here(LexErrorKind::InvalidEscape(other)));
                    }
                    None => {
                        return Err(cursor.error_at_mark(LexErrorKind::UnterminatedString));
                    }
                }
                cursor.bump(); // the escape character handled above
            }
            Some(_) => {
                let c = cursor.bump().unwrap_or_default();
                value.push(c);
            }
        }
    }
}

fn match_identifier_or_keyword(cursor: &mut Cursor<'_>) -> Result<RuleOutcome, LexError> {
    if !cursor.peek().is_some_and(is_ident_start) {
        return Ok(RuleOutcome::NoMatch);
    }
    cursor.bump();
    cursor.bump_while(is_ident_continue);
    let text = cursor.lexeme();
    let kind = KEYWORDS
        .iter()
        .find(|(word, _)| *word == text)
        .map_or_else(|| TokenKind::Identifier(text.into()), |(_, k)| k.clone());
    Ok(RuleOutcome::Emit(kind))
}

/// Tokenizes `source` into a full token sequence terminated by one `Eof`
/// token, or fails with the first lexical error.
///
/// # Errors
///
/// Returns [`LexError`] identifying line, column and the offending input;
/// no partial token list is produced.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let mut cursor = Cursor::new(source);
    let mut tokens = Vec::new();

    'outer: while !cursor.is_eof() {
        cursor.set_mark();
        for rule in registry() {
            match (rule.try_match)(&mut cursor)? {
                RuleOutcome::NoMatch => {}
                RuleOutcome::Skip => continue 'outer,
                RuleOutcome::Emit(kind) => {
                    tokens.push(Token::new(
                        kind,
                        cursor.lexeme(),
                        cursor.span_from_mark(),
                        cursor.mark.1,
                        cursor.mark.2,
                    ));
                    continue 'outer;
                }
            }
        }
        let c = cursor.peek().unwrap_or_default();
        return Err(cursor.error_here(LexErrorKind::UnexpectedCharacter(c)));
    }

    tokens.push(Token::new(
        TokenKind::Eof,
        "",
        Span::point(u32::try_from(source.len()).unwrap_or(u32::MAX)),
        cursor.line,
        cursor.column,
    ));
    debug!(tokens = tokens.len(), "lexing complete");
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lexes")
            .into_iter()
            .map(|t| t.kind().clone())
            .collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("class Point extends Shape is end"),
            vec![
                TokenKind::Class,
                TokenKind::Identifier("Point".into()),
                TokenKind::Extends,
                TokenKind::Identifier("Shape".into()),
                TokenKind::Is,
                TokenKind::End,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn real_literal_forms() {
        assert_eq!(kinds("3.14"), vec![TokenKind::Real(3.14), TokenKind::Eof]);
        assert_eq!(kinds("3."), vec![TokenKind::Real(3.0), TokenKind::Eof]);
        assert_eq!(kinds(".5"), vec![TokenKind::Real(0.5), TokenKind::Eof]);
    }

    #[test]
    fn dot_after_integer_is_not_absorbed_before_identifier() {
        assert_eq!(
            kinds("3.field"),
            vec![
                TokenKind::Integer(3),
                TokenKind::Dot,
                TokenKind::Identifier("field".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn negative_literal_when_minus_touches_digit() {
        assert_eq!(kinds("-7"), vec![TokenKind::Integer(-7), TokenKind::Eof]);
        assert_eq!(
            kinds("a - 1"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Minus,
                TokenKind::Integer(1),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_hex_escape() {
        assert_eq!(
            kinds(r#""abc\x41""#),
            vec![TokenKind::Str("abcA".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn string_simple_escapes() {
        assert_eq!(
            kinds(r#""a\"b\\c\n""#),
            vec![TokenKind::Str("a\"b\\c\n".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_string_is_fatal() {
        let err = lex(r#""abc"#).unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);

        let err = lex("\"abc\ndef\"").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
    }

    #[test]
    fn short_hex_escape_is_fatal() {
        let err = lex(r#""abc\x4""#).unwrap_err();
        assert_eq!(err.kind, LexErrorKind::InvalidHexEscape);
    }

    #[test]
    fn unexpected_character_reports_position() {
        let err = lex("var x :=\n  §").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnexpectedCharacter('§'));
        assert_eq!((err.line, err.column), (2, 3));
    }

    #[test]
    fn comments_and_whitespace_are_suppressed() {
        assert_eq!(
            kinds("x // trailing comment\ny"),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Identifier("y".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn eof_token_sits_at_final_offset() {
        let tokens = lex("ab").unwrap();
        let eof = tokens.last().unwrap();
        assert!(eof.kind().is_eof());
        assert_eq!(eof.span(), Span::point(2));
    }

    #[test]
    fn lexemes_preserve_nonwhitespace_text_in_order() {
        let source = "class A is method f() => 1 + 2.5 end end // tail";
        let tokens = lex(source).unwrap();
        let rebuilt: String = tokens.iter().map(Token::lexeme).collect();
        let wanted: String = source
            .split("//")
            .next()
            .unwrap()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        assert_eq!(rebuilt, wanted);
    }
}

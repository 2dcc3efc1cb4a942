// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Token types produced by the Oxbow lexer.
//!
//! Each [`Token`] carries its [`TokenKind`], the exact source lexeme, a byte
//! [`Span`] and a 1-based line/column pair. Category membership (is this a
//! literal? a bracket?) goes through a static kind→category-set table rather
//! than per-kind switch tables at call sites, so adding a literal kind never
//! touches existing membership checks.

use ecow::EcoString;

use super::Span;

/// The kind of a token.
///
/// Keyword variants carry no payload; literal variants carry the decoded
/// value (string escapes already resolved).
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals and names
    /// An identifier: `counter`, `Main`.
    Identifier(EcoString),
    /// An integer literal: `42`, `-7`.
    Integer(i64),
    /// A real literal: `3.14`, `3.`, `.5`.
    Real(f64),
    /// A string literal with escapes decoded.
    Str(EcoString),
    /// The boolean literal `true`.
    True,
    /// The boolean literal `false`.
    False,

    // Keywords
    Class,
    Extends,
    Is,
    End,
    Var,
    Method,
    If,
    Then,
    Elif,
    Else,
    While,
    Loop,
    Return,
    Break,
    This,
    New,
    And,
    Or,
    Not,

    // Punctuation
    /// `:=`
    Assign,
    /// `=>`
    FatArrow,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    EqualEqual,
    NotEqual,

    /// Synthetic end-of-input marker, positioned at the final offset.
    Eof,
}

/// A token category for O(1) membership tests.
///
/// Categories form the hierarchy required by the token model:
/// `Literal ⊃ BooleanLiteral`, and brackets/parens are split into their own
/// categories so "any bracket" checks need no left/right case lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TokenCategory {
    /// Any literal: integer, real, boolean, string.
    Literal = 0,
    /// The boolean literals `true` and `false`.
    BooleanLiteral = 1,
    /// `[` or `]`.
    Bracket = 2,
    /// `(` or `)`.
    Paren = 3,
    /// A reserved word of the language.
    Keyword = 4,
    /// A binary or unary operator token.
    Operator = 5,
}

impl TokenCategory {
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// A set of [`TokenCategory`] values, packed into one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategorySet(u8);

impl CategorySet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Builds a set from a slice of categories.
    #[must_use]
    pub const fn of(categories: &[TokenCategory]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < categories.len() {
            bits |= categories[i].bit();
            i += 1;
        }
        Self(bits)
    }

    /// Returns `true` if `category` is in the set.
    #[must_use]
    pub const fn contains(self, category: TokenCategory) -> bool {
        self.0 & category.bit() != 0
    }
}

impl TokenKind {
    /// The static category table: every concrete kind maps to the full set
    /// of categories it belongs to. Membership tests never enumerate kinds.
    #[must_use]
    pub const fn categories(&self) -> CategorySet {
        use TokenCategory as C;
        match self {
            Self::Integer(_) | Self::Real(_) | Self::Str(_) => CategorySet::of(&[C::Literal]),
            Self::True | Self::False => {
                CategorySet::of(&[C::Literal, C::BooleanLiteral, C::Keyword])
            }
            Self::LeftBracket | Self::RightBracket => CategorySet::of(&[C::Bracket]),
            Self::LeftParen | Self::RightParen => CategorySet::of(&[C::Paren]),
            Self::Class
            | Self::Extends
            | Self::Is
            | Self::End
            | Self::Var
            | Self::Method
            | Self::If
            | Self::Then
            | Self::Elif
            | Self::Else
            | Self::While
            | Self::Loop
            | Self::Return
            | Self::Break
            | Self::This
            | Self::New => CategorySet::of(&[C::Keyword]),
            Self::And | Self::Or | Self::Not => CategorySet::of(&[C::Keyword, C::Operator]),
            Self::Plus
            | Self::Minus
            | Self::Star
            | Self::Slash
            | Self::Percent
            | Self::Less
            | Self::LessEqual
            | Self::Greater
            | Self::GreaterEqual
            | Self::EqualEqual
            | Self::NotEqual => CategorySet::of(&[C::Operator]),
            Self::Identifier(_)
            | Self::Assign
            | Self::FatArrow
            | Self::Dot
            | Self::Comma
            | Self::Eof => CategorySet::EMPTY,
        }
    }

    /// Returns `true` if this kind belongs to `category`.
    #[must_use]
    pub const fn is_in(&self, category: TokenCategory) -> bool {
        self.categories().contains(category)
    }

    /// Returns `true` for the synthetic end-of-input marker.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    /// The stable kind name used when tokens are serialized.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Identifier(_) => "Identifier",
            Self::Integer(_) => "Integer",
            Self::Real(_) => "Real",
            Self::Str(_) => "String",
            Self::True => "True",
            Self::False => "False",
            Self::Class => "Class",
            Self::Extends => "Extends",
            Self::Is => "Is",
            Self::End => "End",
            Self::Var => "Var",
            Self::Method => "Method",
            Self::If => "If",
            Self::Then => "Then",
            Self::Elif => "Elif",
            Self::Else => "Else",
            Self::While => "While",
            Self::Loop => "Loop",
            Self::Return => "Return",
            Self::Break => "Break",
            Self::This => "This",
            Self::New => "New",
            Self::And => "And",
            Self::Or => "Or",
            Self::Not => "Not",
            Self::Assign => "Assign",
            Self::FatArrow => "FatArrow",
            Self::Dot => "Dot",
            Self::Comma => "Comma",
            Self::LeftParen => "LeftParen",
            Self::RightParen => "RightParen",
            Self::LeftBracket => "LeftBracket",
            Self::RightBracket => "RightBracket",
            Self::Plus => "Plus",
            Self::Minus => "Minus",
            Self::Star => "Star",
            Self::Slash => "Slash",
            Self::Percent => "Percent",
            Self::Less => "Less",
            Self::LessEqual => "LessEqual",
            Self::Greater => "Greater",
            Self::GreaterEqual => "GreaterEqual",
            Self::EqualEqual => "EqualEqual",
            Self::NotEqual => "NotEqual",
            Self::Eof => "Eof",
        }
    }

    /// A short human-readable description used in parse errors.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Identifier(_) => "identifier",
            Self::Integer(_) => "integer literal",
            Self::Real(_) => "real literal",
            Self::Str(_) => "string literal",
            Self::True => "`true`",
            Self::False => "`false`",
            Self::Class => "`class`",
            Self::Extends => "`extends`",
            Self::Is => "`is`",
            Self::End => "`end`",
            Self::Var => "`var`",
            Self::Method => "`method`",
            Self::If => "`if`",
            Self::Then => "`then`",
            Self::Elif => "`elif`",
            Self::Else => "`else`",
            Self::While => "`while`",
            Self::Loop => "`loop`",
            Self::Return => "`return`",
            Self::Break => "`break`",
            Self::This => "`this`",
            Self::New => "`new`",
            Self::And => "`and`",
            Self::Or => "`or`",
            Self::Not => "`not`",
            Self::Assign => "`:=`",
            Self::FatArrow => "`=>`",
            Self::Dot => "`.`",
            Self::Comma => "`,`",
            Self::LeftParen => "`(`",
            Self::RightParen => "`)`",
            Self::LeftBracket => "`[`",
            Self::RightBracket => "`]`",
            Self::Plus => "`+`",
            Self::Minus => "`-`",
            Self::Star => "`*`",
            Self::Slash => "`/`",
            Self::Percent => "`%`",
            Self::Less => "`<`",
            Self::LessEqual => "`<=`",
            Self::Greater => "`>`",
            Self::GreaterEqual => "`>=`",
            Self::EqualEqual => "`==`",
            Self::NotEqual => "`!=`",
            Self::Eof => "end of input",
        }
    }
}

/// A lexed token: kind, exact lexeme, byte span and 1-based line/column.
///
/// Tokens are immutable once produced; the lexer emits the whole sequence
/// up front, terminated by exactly one [`TokenKind::Eof`].
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    kind: TokenKind,
    lexeme: EcoString,
    span: Span,
    line: u32,
    column: u32,
}

impl Token {
    /// Creates a token.
    #[must_use]
    pub fn new(
        kind: TokenKind,
        lexeme: impl Into<EcoString>,
        span: Span,
        line: u32,
        column: u32,
    ) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
            line,
            column,
        }
    }

    /// The token kind.
    #[must_use]
    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }

    /// The exact source text of the token.
    #[must_use]
    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    /// The byte span in the original source.
    #[must_use]
    pub fn span(&self) -> Span {
        self.span
    }

    /// 1-based source line.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// 1-based source column (in characters).
    #[must_use]
    pub fn column(&self) -> u32 {
        self.column
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_category_covers_all_literal_kinds() {
        use TokenCategory::Literal;
        assert!(TokenKind::Integer(1).is_in(Literal));
        assert!(TokenKind::Real(2.5).is_in(Literal));
        assert!(TokenKind::Str("s".into()).is_in(Literal));
        assert!(TokenKind::True.is_in(Literal));
        assert!(TokenKind::False.is_in(Literal));
        assert!(!TokenKind::Identifier("x".into()).is_in(Literal));
    }

    #[test]
    fn boolean_literals_are_both_literal_and_boolean() {
        assert!(TokenKind::True.is_in(TokenCategory::BooleanLiteral));
        assert!(TokenKind::False.is_in(TokenCategory::BooleanLiteral));
        assert!(!TokenKind::Integer(0).is_in(TokenCategory::BooleanLiteral));
    }

    #[test]
    fn bracket_and_paren_categories_are_disjoint() {
        assert!(TokenKind::LeftBracket.is_in(TokenCategory::Bracket));
        assert!(TokenKind::RightBracket.is_in(TokenCategory::Bracket));
        assert!(!TokenKind::LeftParen.is_in(TokenCategory::Bracket));
        assert!(TokenKind::LeftParen.is_in(TokenCategory::Paren));
        assert!(TokenKind::RightParen.is_in(TokenCategory::Paren));
    }

    #[test]
    fn keyword_operators_are_in_both_categories() {
        assert!(TokenKind::And.is_in(TokenCategory::Keyword));
        assert!(TokenKind::And.is_in(TokenCategory::Operator));
        assert!(TokenKind::Plus.is_in(TokenCategory::Operator));
        assert!(!TokenKind::Plus.is_in(TokenCategory::Keyword));
    }

    #[test]
    fn token_accessors() {
        let token = Token::new(TokenKind::Integer(42), "42", Span::new(4, 6), 2, 3);
        assert_eq!(token.kind(), &TokenKind::Integer(42));
        assert_eq!(token.lexeme(), "42");
        assert_eq!(token.span(), Span::new(4, 6));
        assert_eq!(token.line(), 2);
        assert_eq!(token.column(), 3);
    }
}

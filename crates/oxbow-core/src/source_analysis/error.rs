// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Fatal front-end failures.
//!
//! Lexing and parsing abort on the first error; the failure is a typed
//! result value carrying line, column and message, never an unwound panic.
//! Both errors integrate with [`miette`] for labeled terminal reports.

// Spurious warnings from miette derive macro expansion
#![allow(unused_assignments)]

use ecow::EcoString;
use miette::Diagnostic;
use thiserror::Error;

use super::Span;

/// A fatal lexical error. No token list is produced past this point.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{kind}")]
#[diagnostic()]
pub struct LexError {
    /// What went wrong.
    #[source]
    pub kind: LexErrorKind,
    /// Byte span of the offending input.
    #[label("here")]
    pub span: Span,
    /// 1-based line of the offending character.
    pub line: u32,
    /// 1-based column of the offending character.
    pub column: u32,
}

impl LexError {
    /// Creates a lexical error at the given position.
    #[must_use]
    pub fn new(kind: LexErrorKind, span: Span, line: u32, column: u32) -> Self {
        Self {
            kind,
            span,
            line,
            column,
        }
    }
}

/// The kind of lexical error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    /// No lexer rule matched at this position.
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),

    /// A string literal hit a raw newline or end-of-input before `"`.
    #[error("unterminated string literal")]
    UnterminatedString,

    /// An unknown or malformed escape sequence inside a string.
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),

    /// `\x` not followed by exactly two hex digits.
    #[error("invalid hex escape: expected two hex digits after '\\x'")]
    InvalidHexEscape,

    /// A numeric literal that does not parse into its value type.
    #[error("invalid number literal '{0}'")]
    InvalidNumber(EcoString),
}

/// A fatal syntax error, positioned at the offending token.
///
/// The parser does not recover: one syntax error terminates parsing for the
/// whole unit.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic()]
pub struct ParseError {
    /// Human-readable description, e.g. "expected `end`, found `else`".
    pub message: EcoString,
    /// Byte span of the offending token.
    #[label("unexpected token")]
    pub span: Span,
    /// 1-based line of the offending token.
    pub line: u32,
    /// 1-based column of the offending token.
    pub column: u32,
}

impl ParseError {
    /// Creates a parse error at the given token position.
    #[must_use]
    pub fn new(message: impl Into<EcoString>, span: Span, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            span,
            line,
            column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_display() {
        let err = LexError::new(
            LexErrorKind::UnexpectedCharacter('§'),
            Span::new(0, 2),
            1,
            1,
        );
        assert_eq!(err.to_string(), "unexpected character '§'");

        let err = LexError::new(LexErrorKind::UnterminatedString, Span::new(3, 8), 1, 4);
        assert_eq!(err.to_string(), "unterminated string literal");
    }

    #[test]
    fn parse_error_carries_position() {
        let err = ParseError::new("expected `end`", Span::new(10, 13), 2, 5);
        assert_eq!(err.to_string(), "expected `end`");
        assert_eq!((err.line, err.column), (2, 5));
    }
}

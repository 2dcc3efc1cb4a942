// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Lexical and syntactic analysis for Oxbow source code.
//!
//! [`lex`] turns source text into a full, `Eof`-terminated token sequence
//! (or one fatal [`LexError`]); [`parse`] turns that sequence into a
//! [`Program`](crate::ast::Program) (or one fatal [`ParseError`]). Both
//! stages fail fast: the pipeline converts their typed errors into
//! stage-tagged diagnostics, so callers never see an unwound panic for
//! malformed input.

mod error;
mod lexer;
mod parser;
mod span;
mod token;

// Property-based round-trip tests for the lexer.
#[cfg(test)]
mod lexer_property_tests;

pub use error::{LexError, LexErrorKind, ParseError};
pub use lexer::lex;
pub use parser::parse;
pub use span::Span;
pub use token::{CategorySet, Token, TokenCategory, TokenKind};

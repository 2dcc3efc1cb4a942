// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Oxbow compiler core.
//!
//! This crate contains the whole compiler:
//! - Lexical analysis (tokenization)
//! - Parsing (AST construction)
//! - Semantic analysis (advisory errors and warnings)
//! - Optimisation (AST rewriting with explained, source-mapped steps)
//! - Code generation (binary wasm module)
//!
//! [`pipeline::compile`] runs every stage over one source text and returns
//! the aggregate [`pipeline::PipelineOutput`]; the individual stage
//! modules are public for callers that want a single stage.

pub mod ast;
pub mod builtins;
pub mod codegen;
pub mod diagnostics;
pub mod optimize;
pub mod pipeline;
pub mod semantic_analysis;
pub mod source_analysis;
pub mod source_map;
pub mod unparse;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::ast::{ClassDecl, Expr, Literal, MethodDecl, Program, Stmt};
    pub use crate::diagnostics::{Diagnostic, Severity, Stage};
    pub use crate::pipeline::{compile, PipelineOutput};
    pub use crate::source_analysis::{Span, Token, TokenKind};
}

// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The compilation pipeline.
//!
//! [`compile`] drives every stage over one source text and collects the
//! lot into a single [`PipelineOutput`]: tokens, AST, semantic report,
//! optimised AST with explained rewrite steps, pretty-printed optimised
//! source, and the generated wasm module (base64).
//!
//! Failure degrades rather than aborts. A lexical error yields an
//! otherwise-empty output carrying that one diagnostic; a syntax error
//! still carries the full token list; semantic findings are advisory and
//! never stop compilation; a code-generation error is reported as the
//! single `Optimize`-stage diagnostic while everything produced before it
//! is kept.
//!
//! `compile` is a pure function of the source text: it touches no shared
//! mutable state and is safe to call from any number of threads.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ecow::EcoString;
use serde::Serialize;
use tracing::debug;

use crate::ast::Program;
use crate::codegen;
use crate::diagnostics::{Diagnostic, Stage};
use crate::optimize::{self, OptimizationStep};
use crate::semantic_analysis::{self, SemanticReport};
use crate::source_analysis::{lex, parse, Token};
use crate::source_map;

/// A serializable view of one token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TokenRecord {
    /// Stable kind name, e.g. `Identifier` or `LeftParen`.
    pub kind: &'static str,
    pub lexeme: EcoString,
    /// Byte offset of the first lexeme character.
    pub start: u32,
    /// Byte offset one past the last lexeme character.
    pub end: u32,
    pub line: u32,
    pub column: u32,
}

impl From<&Token> for TokenRecord {
    fn from(token: &Token) -> Self {
        Self {
            kind: token.kind().name(),
            lexeme: token.lexeme().into(),
            start: token.span().start(),
            end: token.span().end(),
            line: token.line(),
            column: token.column(),
        }
    }
}

/// Everything one compilation produced, across all stages.
///
/// Constructed once per [`compile`] call and never mutated afterwards;
/// the aggregate serializes in one piece (see the `dump` CLI command).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PipelineOutput {
    /// The full token sequence; empty only when lexing failed.
    pub tokens: Vec<TokenRecord>,
    /// The parsed program, absent on front-end failure.
    pub ast: Option<Program>,
    /// Semantic findings; always present, possibly empty.
    pub semantic: SemanticReport,
    /// The optimised program, absent on front-end failure.
    pub optimized_ast: Option<Program>,
    /// The single fatal diagnostic, when a stage failed.
    pub stage_error: Option<Diagnostic>,
    /// Rewrite steps in application order.
    pub optimizations: Option<Vec<OptimizationStep>>,
    /// Pretty-printed optimised program.
    pub optimized_source: Option<String>,
    /// Generated wasm module, base64-encoded.
    pub wasm_module: Option<String>,
}

impl PipelineOutput {
    fn empty() -> Self {
        Self {
            tokens: Vec::new(),
            ast: None,
            semantic: SemanticReport::default(),
            optimized_ast: None,
            stage_error: None,
            optimizations: None,
            optimized_source: None,
            wasm_module: None,
        }
    }

    /// Returns `true` when no stage failed fatally.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.stage_error.is_none()
    }
}

/// Compiles one source text through every stage.
#[must_use]
pub fn compile(source: &str) -> PipelineOutput {
    let mut output = PipelineOutput::empty();

    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(err) => {
            debug!(line = err.line, "lexing failed");
            output.stage_error = Some(
                Diagnostic::error(Stage::Lex, err.line, err.to_string()).with_span(err.span),
            );
            return output;
        }
    };
    output.tokens = tokens.iter().map(TokenRecord::from).collect();

    let program = match parse(tokens.clone()) {
        Ok(program) => program,
        Err(err) => {
            debug!(line = err.line, "parsing failed");
            output.stage_error = Some(
                Diagnostic::error(Stage::Parse, err.line, err.message.clone())
                    .with_span(err.span),
            );
            return output;
        }
    };

    output.semantic = semantic_analysis::analyse(&program);

    let (optimized, mut steps) = optimize::optimize(&program);
    source_map::resolve_spans(&mut steps, &tokens);
    output.optimized_source = Some(optimize::optimized_source(&optimized));

    match codegen::generate(&optimized) {
        Ok(module) => {
            debug!(bytes = module.len(), "code generation succeeded");
            output.wasm_module = Some(STANDARD.encode(module));
        }
        Err(err) => {
            debug!(%err, "code generation failed");
            output.stage_error =
                Some(Diagnostic::error(Stage::Optimize, gen_error_line(&err), err.to_string()));
        }
    }

    output.ast = Some(program);
    output.optimized_ast = Some(optimized);
    output.optimizations = Some(steps);
    output
}

/// Best-effort line of a generation error, `0` when the failure is not
/// tied to a source position.
fn gen_error_line(err: &codegen::GenError) -> u32 {
    use codegen::GenError::{
        ArityMismatch, BreakOutsideLoop, InheritanceCycle, IntegerOverflow, MissingMain,
        UnknownClass, UnknownField, UnknownHostFunction, UnknownMethod, UnknownVariable,
        UnresolvableReceiver,
    };
    match err {
        MissingMain => 0,
        UnknownClass { line, .. }
        | UnknownMethod { line, .. }
        | UnknownField { line, .. }
        | UnknownVariable { line, .. }
        | UnresolvableReceiver { line, .. }
        | UnknownHostFunction { line, .. }
        | ArityMismatch { line, .. }
        | IntegerOverflow { line, .. }
        | BreakOutsideLoop { line }
        | InheritanceCycle { line, .. } => *line,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::diagnostics::Severity;

    const HELLO: &str = "class Main is\n  method Main() is\n    io.PrintInteger(42)\n    return 0\n  end\nend\n";

    #[test]
    fn clean_program_populates_every_stage() {
        let output = compile(HELLO);
        assert!(output.succeeded());
        assert!(!output.tokens.is_empty());
        assert!(output.ast.is_some());
        assert!(output.semantic.is_clean());
        assert!(output.optimized_ast.is_some());
        assert!(output.optimized_source.is_some());
        let module = output.wasm_module.expect("module generated");
        // base64 of the 8-byte prefix \0asm\x01\0\0\0.
        assert!(module.starts_with("AGFzbQEAAAA"));
    }

    #[test]
    fn lex_failure_yields_empty_output_with_one_diagnostic() {
        let output = compile("class Main is § end");
        let err = output.stage_error.expect("stage error");
        assert_eq!(err.stage, Stage::Lex);
        assert_eq!(err.severity, Severity::Error);
        assert!(output.tokens.is_empty());
        assert!(output.ast.is_none());
        assert!(output.wasm_module.is_none());
    }

    #[test]
    fn parse_failure_keeps_the_token_list() {
        let output = compile("class Main is\n  method Main() is\n    if x\n  end\nend\n");
        let err = output.stage_error.expect("stage error");
        assert_eq!(err.stage, Stage::Parse);
        assert!(!output.tokens.is_empty());
        assert!(output.ast.is_none());
        assert!(output.optimizations.is_none());
    }

    #[test]
    fn semantic_findings_do_not_stop_compilation() {
        // Unused local: a warning, not an error.
        let source = "class Main is\n  method Main() is\n    var unused := 1\n    return 0\n  end\nend\n";
        let output = compile(source);
        assert!(output.succeeded());
        assert!(!output.semantic.warnings.is_empty());
        assert!(output.wasm_module.is_some());
    }

    #[test]
    fn codegen_failure_keeps_earlier_stage_output() {
        // No Main class: the front end and optimiser still run.
        let output = compile("class Other is\n  method go() => 1\nend\n");
        let err = output.stage_error.expect("stage error");
        assert_eq!(err.stage, Stage::Optimize);
        assert!(!output.tokens.is_empty());
        assert!(output.ast.is_some());
        assert!(output.optimized_ast.is_some());
        assert!(output.wasm_module.is_none());
    }

    #[test]
    fn optimization_steps_carry_resolved_spans() {
        let source = "class Main is\n  method Main() is\n    return 2 + 3\n  end\nend\n";
        let output = compile(source);
        let steps = output.optimizations.expect("steps present");
        let fold = steps
            .iter()
            .find(|s| s.before.as_deref() == Some("2 + 3"))
            .expect("fold step recorded");
        // No identifier in the snippet, so the mapper falls back to the
        // extent of the statement's line.
        let (start, end) = (fold.start.expect("start"), fold.end.expect("end"));
        assert_eq!(&source[start as usize..end as usize], "return 2 + 3");
    }

    #[test]
    fn output_serializes_with_stable_keys() {
        let json = serde_json::to_value(compile(HELLO)).expect("serializes");
        for key in [
            "Tokens",
            "Ast",
            "Semantic",
            "OptimizedAst",
            "StageError",
            "Optimizations",
            "OptimizedSource",
            "WasmModule",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(json["Tokens"][0]["Kind"], "Class");
        assert_eq!(json["Tokens"][0]["Lexeme"], "class");
    }
}

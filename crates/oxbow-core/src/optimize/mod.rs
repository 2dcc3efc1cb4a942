// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Optimization passes over the parsed program.
//!
//! The optimizer clones the AST (the input tree is never mutated) and runs a
//! fixed pass order to a fixed point, bounded by [`MAX_SWEEPS`]:
//!
//! 1. constant folding
//! 2. `if` simplification
//! 3. `while` elimination
//! 4. unreachable-code elimination
//! 5. unused-variable removal
//! 6. function inlining
//! 7. constructor-literal elision
//!
//! Every rewrite appends one [`OptimizationStep`] with a pretty-printed
//! before/after snippet and a hint identifier for later span recovery. The
//! optimizer never fails: a pass that cannot prove a rewrite safe leaves the
//! tree alone.
//!
//! # Adding a New Pass
//!
//! 1. Create the pass in `fold.rs`, `flow.rs` or `inline.rs` (or a new
//!    file), implementing [`Pass`].
//! 2. Push it into [`all_passes`] at the right point in the order.

mod flow;
mod fold;
mod inline;

use ecow::EcoString;
use serde::Serialize;
use tracing::debug;

use crate::ast::Program;
use crate::unparse;

/// Sweep bound; the fixed point is normally reached in two.
const MAX_SWEEPS: usize = 8;

/// What kind of rewrite a step records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepKind {
    InlineFunction,
    ConstantFold,
    IfSimplify,
    WhileEliminate,
    RemoveUnusedVar,
    UnreachableElimination,
    ConstructorLiteralElide,
    Other,
}

/// One recorded rewrite.
///
/// `start`/`end` are character offsets into the original source, filled in
/// by the source mapper after the fact; the optimizer itself only knows
/// lines. The hint is not serialized; it exists for the mapper.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OptimizationStep {
    pub kind: StepKind,
    pub message: EcoString,
    pub line: u32,
    pub before: Option<EcoString>,
    pub after: Option<EcoString>,
    pub start: Option<u32>,
    pub end: Option<u32>,
    #[serde(skip)]
    pub hint: Option<EcoString>,
}

/// Shared state threaded through the passes.
#[derive(Debug, Default)]
pub(crate) struct PassContext {
    steps: Vec<OptimizationStep>,
}

impl PassContext {
    /// Appends one step, deriving the hint from the before snippet.
    pub(crate) fn record(
        &mut self,
        kind: StepKind,
        message: EcoString,
        line: u32,
        before: Option<EcoString>,
        after: Option<EcoString>,
    ) {
        let hint = before.as_deref().and_then(hint_identifier);
        self.steps.push(OptimizationStep {
            kind,
            message,
            line,
            before,
            after,
            start: None,
            end: None,
            hint,
        });
    }
}

/// A single optimization pass. Returns `true` when the tree changed.
pub(crate) trait Pass {
    fn name(&self) -> &'static str;
    fn run(&self, program: &mut Program, cx: &mut PassContext) -> bool;
}

fn all_passes() -> Vec<Box<dyn Pass>> {
    vec![
        Box::new(fold::ConstantFold),
        Box::new(flow::IfSimplify),
        Box::new(flow::WhileEliminate),
        Box::new(flow::UnreachableElimination),
        Box::new(flow::RemoveUnusedVar),
        Box::new(inline::InlineFunction),
        Box::new(inline::ConstructorLiteralElide),
    ]
}

/// Optimizes a program, returning the rewritten tree and the step log.
///
/// The input tree is left untouched; the result never aliases it.
#[must_use]
pub fn optimize(program: &Program) -> (Program, Vec<OptimizationStep>) {
    let mut optimized = program.clone();
    let mut cx = PassContext::default();
    let passes = all_passes();
    for sweep in 0..MAX_SWEEPS {
        let mut changed = false;
        for pass in &passes {
            if pass.run(&mut optimized, &mut cx) {
                debug!(pass = pass.name(), sweep, "pass rewrote the tree");
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    (optimized, cx.steps)
}

/// Pretty-prints the optimized program for the pipeline result.
#[must_use]
pub fn optimized_source(program: &Program) -> String {
    unparse::unparse_program(program)
}

/// Extracts the first identifier from a snippet, skipping keywords, for use
/// as a span-recovery hint.
fn hint_identifier(snippet: &str) -> Option<EcoString> {
    const KEYWORDS: &[&str] = &[
        "class", "extends", "is", "end", "var", "method", "if", "then", "elif", "else", "while",
        "loop", "return", "break", "this", "new", "true", "false", "and", "or", "not",
    ];
    let mut word = String::new();
    for c in snippet.chars().chain(std::iter::once(' ')) {
        if c == '_' || c.is_ascii_alphanumeric() {
            word.push(c);
            continue;
        }
        if !word.is_empty() {
            let starts_like_identifier = word
                .chars()
                .next()
                .is_some_and(|c| c == '_' || c.is_ascii_alphabetic());
            if starts_like_identifier && !KEYWORDS.contains(&word.as_str()) {
                return Some(EcoString::from(word));
            }
            word.clear();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_analysis::{lex, parse};
    use pretty_assertions::assert_eq;

    fn program(source: &str) -> Program {
        parse(lex(source).expect("lexes")).expect("parses")
    }

    #[test]
    fn hint_skips_keywords_and_literals() {
        assert_eq!(hint_identifier("var x := 1 + 2"), Some("x".into()));
        assert_eq!(hint_identifier("if total > 10 then"), Some("total".into()));
        assert_eq!(hint_identifier("return 1"), None);
        assert_eq!(hint_identifier("3 + 4"), None);
    }

    #[test]
    fn constant_condition_keeps_only_the_taken_branch() {
        let input = program(
            "class Main is\n\
             method Main() is\n\
             if true then\n\
             return 1\n\
             else\n\
             return 2\n\
             end\n\
             end\n\
             end\n",
        );
        let (optimized, steps) = optimize(&input);
        let printed = optimized_source(&optimized);
        assert!(printed.contains("return 1"));
        assert!(!printed.contains("else"));
        assert!(!printed.contains("return 2"));
        let step = steps
            .iter()
            .find(|s| s.kind == StepKind::IfSimplify)
            .expect("an IfSimplify step");
        assert!(!step.after.as_deref().unwrap_or_default().contains("else"));
    }

    #[test]
    fn optimizing_twice_reaches_a_fixed_point() {
        let input = program(
            "class Main is\n\
             method Main() is\n\
             var x := 1 + 2 * 3\n\
             if x > 0 and true then\n\
             io.PrintInteger(x)\n\
             end\n\
             while false loop\n\
             io.PrintLine()\n\
             end\n\
             end\n\
             end\n",
        );
        let (once, first_steps) = optimize(&input);
        assert!(!first_steps.is_empty());
        let (twice, second_steps) = optimize(&once);
        assert_eq!(second_steps.len(), 0);
        assert_eq!(optimized_source(&twice), optimized_source(&once));
    }

    #[test]
    fn input_tree_is_not_mutated() {
        let input = program(
            "class Main is\n\
             method Main() is\n\
             var x := 1 + 2\n\
             io.PrintInteger(x)\n\
             end\n\
             end\n",
        );
        let before = unparse::unparse_program(&input);
        let _ = optimize(&input);
        assert_eq!(unparse::unparse_program(&input), before);
    }

    #[test]
    fn steps_carry_lines_and_snippets() {
        let input = program(
            "class Main is\n\
             method Main() is\n\
             var x := 2 + 3\n\
             io.PrintInteger(x)\n\
             end\n\
             end\n",
        );
        let (_, steps) = optimize(&input);
        let fold = steps
            .iter()
            .find(|s| s.kind == StepKind::ConstantFold)
            .expect("a fold step");
        assert_eq!(fold.line, 3);
        assert_eq!(fold.before.as_deref(), Some("2 + 3"));
        assert_eq!(fold.after.as_deref(), Some("5"));
    }
}

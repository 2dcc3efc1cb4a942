// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Span recovery for optimization steps.
//!
//! Steps are recorded against the rewritten tree, which only knows source
//! lines, so highlighting needs the original character span back. This is
//! provenance recovery after the fact, and it is heuristic: given a step's
//! declared line and hint identifier, the mapper searches the token stream
//! for a matching lexeme on that line, then on the two neighbouring lines
//! in either direction, and otherwise falls back to the full extent of the
//! declared line. Steps on lines the optimizer invented (none today) would
//! simply stay unmapped.

use crate::optimize::OptimizationStep;
use crate::source_analysis::{Span, Token};

/// How far from the declared line the hint search is allowed to wander.
const NEIGHBOUR_RADIUS: u32 = 2;

/// Fills `start`/`end` on every step from the original token stream.
pub fn resolve_spans(steps: &mut [OptimizationStep], tokens: &[Token]) {
    for step in steps {
        if let Some(span) = resolve_step(step.line, step.hint.as_deref(), tokens) {
            step.start = Some(span.start());
            step.end = Some(span.end());
        }
    }
}

fn resolve_step(line: u32, hint: Option<&str>, tokens: &[Token]) -> Option<Span> {
    if let Some(hint) = hint {
        if let Some(span) = find_hint(line, hint, tokens) {
            return Some(span);
        }
    }
    line_extent(line, tokens)
}

/// Searches the declared line first, then rings of neighbouring lines.
fn find_hint(line: u32, hint: &str, tokens: &[Token]) -> Option<Span> {
    let matches_on = |candidate: u32| {
        tokens
            .iter()
            .find(|t| t.line() == candidate && t.lexeme() == hint)
            .map(Token::span)
    };
    if let Some(span) = matches_on(line) {
        return Some(span);
    }
    for distance in 1..=NEIGHBOUR_RADIUS {
        if let Some(span) = line.checked_sub(distance).and_then(matches_on) {
            return Some(span);
        }
        if let Some(span) = matches_on(line + distance) {
            return Some(span);
        }
    }
    None
}

/// The merged span of every token on the line.
fn line_extent(line: u32, tokens: &[Token]) -> Option<Span> {
    let mut extent: Option<Span> = None;
    for token in tokens {
        if token.line() != line || token.kind().is_eof() {
            continue;
        }
        extent = Some(match extent {
            Some(acc) => acc.merge(token.span()),
            None => token.span(),
        });
    }
    extent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::{OptimizationStep, StepKind};
    use crate::source_analysis::lex;
    use pretty_assertions::assert_eq;

    fn step(line: u32, hint: Option<&str>) -> OptimizationStep {
        OptimizationStep {
            kind: StepKind::Other,
            message: "test".into(),
            line,
            before: None,
            after: None,
            start: None,
            end: None,
            hint: hint.map(Into::into),
        }
    }

    #[test]
    fn hint_on_the_declared_line_wins() {
        let source = "var total := 1\nvar other := total + 2\n";
        let tokens = lex(source).unwrap();
        let mut steps = [step(2, Some("total"))];
        resolve_spans(&mut steps, &tokens);
        let (start, end) = (steps[0].start.unwrap(), steps[0].end.unwrap());
        assert_eq!(&source[start as usize..end as usize], "total");
        assert!(start > u32::try_from(source.find('\n').unwrap()).unwrap());
    }

    #[test]
    fn hint_search_extends_to_neighbouring_lines() {
        let source = "var a := 1\nvar b := 2\nvar target := 3\n";
        let tokens = lex(source).unwrap();
        // Declared two lines away from where the hint actually sits.
        let mut steps = [step(1, Some("target"))];
        resolve_spans(&mut steps, &tokens);
        let (start, end) = (steps[0].start.unwrap(), steps[0].end.unwrap());
        assert_eq!(&source[start as usize..end as usize], "target");
    }

    #[test]
    fn missing_hint_falls_back_to_the_line_extent() {
        let source = "var a := 1\nvar b := 2 + 3\n";
        let tokens = lex(source).unwrap();
        let mut steps = [step(2, None), step(2, Some("nowhere"))];
        resolve_spans(&mut steps, &tokens);
        for step in &steps {
            let (start, end) = (step.start.unwrap(), step.end.unwrap());
            assert_eq!(&source[start as usize..end as usize], "var b := 2 + 3");
        }
    }

    #[test]
    fn unknown_line_stays_unmapped() {
        let tokens = lex("var a := 1\n").unwrap();
        let mut steps = [step(40, None)];
        resolve_spans(&mut steps, &tokens);
        assert_eq!(steps[0].start, None);
        assert_eq!(steps[0].end, None);
    }
}

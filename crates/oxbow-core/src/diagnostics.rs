// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Pipeline diagnostics.
//!
//! Every finding the pipeline reports — fatal front-end failures, advisory
//! semantic findings, the single code-generation stage error — is carried
//! as a [`Diagnostic`] tagged with the [`Stage`] that produced it.
//! Diagnostics are immutable once produced and are never merged.

use ecow::EcoString;
use serde::Serialize;

use crate::source_analysis::Span;

/// The pipeline stage a diagnostic originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Lex,
    Parse,
    Semantic,
    Optimize,
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single immutable finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Stage that produced the finding.
    pub stage: Stage,
    /// Best-effort 1-based source line.
    pub line: u32,
    /// Human-readable message.
    pub message: EcoString,
    pub severity: Severity,
    /// Byte span when one is known (always present for lex/parse errors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    #[must_use]
    pub fn error(stage: Stage, line: u32, message: impl Into<EcoString>) -> Self {
        Self {
            stage,
            line,
            message: message.into(),
            severity: Severity::Error,
            span: None,
        }
    }

    /// Creates a warning diagnostic.
    #[must_use]
    pub fn warning(stage: Stage, line: u32, message: impl Into<EcoString>) -> Self {
        Self {
            stage,
            line,
            message: message.into(),
            severity: Severity::Warning,
            span: None,
        }
    }

    /// Attaches a byte span.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_analysis::Span;

    #[test]
    fn constructors_set_severity_and_stage() {
        let err = Diagnostic::error(Stage::Parse, 3, "boom");
        assert_eq!(err.severity, Severity::Error);
        assert_eq!(err.stage, Stage::Parse);
        assert_eq!(err.span, None);

        let warn = Diagnostic::warning(Stage::Semantic, 1, "meh").with_span(Span::new(0, 2));
        assert_eq!(warn.severity, Severity::Warning);
        assert_eq!(warn.span, Some(Span::new(0, 2)));
    }

    #[test]
    fn serializes_enums_as_strings() {
        let diag = Diagnostic::error(Stage::Lex, 1, "x");
        let json = serde_json::to_value(&diag).expect("serializes");
        assert_eq!(json["stage"], "Lex");
        assert_eq!(json["severity"], "Error");
    }
}

// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The `build`, `check` and `dump` subcommands.
//!
//! All file I/O lives here; the compiler core is a pure function of the
//! source text. Fatal lex/parse/generation errors become labeled miette
//! reports against the named source file; semantic findings print as plain
//! diagnostics and only fail the `check` command.

use std::fs;

use camino::Utf8Path;
use miette::{Context, IntoDiagnostic, NamedSource, Report, Result};
use tracing::{debug, info};

use oxbow_core::ast::Program;
use oxbow_core::diagnostics::Diagnostic;
use oxbow_core::semantic_analysis::{self, SemanticReport};
use oxbow_core::source_analysis::{lex, parse};
use oxbow_core::{codegen, optimize, pipeline};

/// Compile one source file and write the wasm module next to it.
pub fn build(file: &Utf8Path, output: Option<&Utf8Path>) -> Result<()> {
    let source = read_source(file)?;
    let program = front_end(file, &source)?;

    let report = semantic_analysis::analyse(&program);
    print_report(&report);

    let (optimized, steps) = optimize::optimize(&program);
    debug!(steps = steps.len(), "optimisation finished");

    let module = codegen::generate(&optimized).map_err(Report::new)?;

    let out = output.map_or_else(|| file.with_extension("wasm"), Utf8Path::to_path_buf);
    fs::write(&out, &module)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to write {out}"))?;
    info!(module_bytes = module.len(), "build finished");
    println!("Wrote {out} ({} bytes)", module.len());
    Ok(())
}

/// Run the front end and semantic analysis; fail on semantic errors.
pub fn check(file: &Utf8Path) -> Result<()> {
    let source = read_source(file)?;
    let program = front_end(file, &source)?;

    let report = semantic_analysis::analyse(&program);
    print_report(&report);
    if !report.errors.is_empty() {
        miette::bail!(
            "{file}: {} semantic error(s)",
            report.errors.len()
        );
    }
    println!(
        "{file}: ok ({} warning(s))",
        report.warnings.len()
    );
    Ok(())
}

/// Compile through every stage and print the aggregate result as JSON.
pub fn dump(file: &Utf8Path) -> Result<()> {
    let source = read_source(file)?;
    let output = pipeline::compile(&source);
    let json = serde_json::to_string_pretty(&output)
        .into_diagnostic()
        .wrap_err("failed to serialize the compilation result")?;
    println!("{json}");
    Ok(())
}

fn read_source(file: &Utf8Path) -> Result<String> {
    fs::read_to_string(file)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {file}"))
}

/// Lexes and parses, converting fatal errors into labeled reports against
/// the named file.
fn front_end(file: &Utf8Path, source: &str) -> Result<Program> {
    let named = || NamedSource::new(file.as_str(), source.to_string());
    let tokens = lex(source).map_err(|err| Report::new(err).with_source_code(named()))?;
    parse(tokens).map_err(|err| Report::new(err).with_source_code(named()))
}

fn print_report(report: &SemanticReport) {
    for finding in report.errors.iter().chain(&report.warnings) {
        print_diagnostic(finding);
    }
}

fn print_diagnostic(diag: &Diagnostic) {
    println!(
        "{:?} [{:?}] line {}: {}",
        diag.severity, diag.stage, diag.line, diag.message
    );
}

// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Oxbow compiler command-line interface.
//!
//! This is the main entry point for the `oxbow` command.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use miette::Result;

mod commands;

/// Oxbow: a class-based language compiled to WebAssembly
#[derive(Debug, Parser)]
#[command(name = "oxbow")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile a source file to a wasm module
    Build {
        /// Source file to compile
        file: Utf8PathBuf,

        /// Output path (defaults to the input with a `.wasm` extension)
        #[arg(short, long)]
        output: Option<Utf8PathBuf>,
    },

    /// Run the front end and semantic analysis without generating code
    Check {
        /// Source file to check
        file: Utf8PathBuf,
    },

    /// Print the full compilation result of every stage as JSON
    Dump {
        /// Source file to compile
        file: Utf8PathBuf,
    },
}

fn main() -> Result<()> {
    // Install miette's fancy error handler
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Build { file, output } => commands::build(&file, output.as_deref()),
        Command::Check { file } => commands::check(&file),
        Command::Dump { file } => commands::dump(&file),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("{e:?}");
            std::process::exit(1);
        }
    }
}

//! The astgen command-line interface.
//!
//! This module is the entry point for all CLI commands and orchestrates
//! the core library functions. Exit status is zero on full success and
//! non-zero on any validation, generation, or emission failure.

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use log::LevelFilter;

use crate::cli::args::{AstgenArgs, Command};
use crate::emit::OutputLayout;
use crate::errors::{print_error, AstgenError};
use crate::{pipeline, schema};

pub mod args;

/// The main entry point for the CLI.
pub fn run() {
    let args = AstgenArgs::parse();
    configure_logger(args.verbose);

    let result = match args.command {
        Command::Generate {
            schema,
            ast_dir,
            visitor_dir,
            binding_dir,
        } => handle_generate(
            &schema,
            OutputLayout {
                ast_dir,
                visitor_dir,
                binding_dir,
            },
        ),
        Command::Check { schema } => handle_check(&schema),
        Command::Inspect { schema } => handle_inspect(&schema),
    };

    if let Err(e) = result {
        print_error(e);
        process::exit(1);
    }
}

/// Map repeated `-v` flags onto logger levels: warnings by default, info
/// at `-v`, debug from `-vv` up.
fn configure_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

/// Handles the `generate` subcommand.
fn handle_generate(schema_path: &Path, layout: OutputLayout) -> Result<(), AstgenError> {
    let summary = pipeline::run(schema_path, layout)?;
    println!(
        "generated {} node type(s); wrote {} file(s):",
        summary.node_count,
        summary.written.len()
    );
    for path in &summary.written {
        println!("  {}", path.display());
    }
    Ok(())
}

/// Handles the `check` subcommand.
fn handle_check(schema_path: &PathBuf) -> Result<(), AstgenError> {
    let schema = schema::load_file(schema_path)?;
    println!("schema OK: {} node definition(s)", schema.len());
    Ok(())
}

/// Handles the `inspect` subcommand.
fn handle_inspect(schema_path: &PathBuf) -> Result<(), AstgenError> {
    let schema = schema::load_file(schema_path)?;
    let json = serde_json::to_string_pretty(&schema)
        .map_err(|e| AstgenError::internal(format!("model serialization failed: {}", e)))?;
    println!("{}", json);
    Ok(())
}

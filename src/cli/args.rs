//! Defines the command-line arguments and subcommands for the astgen CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "astgen",
    version,
    about = "Schema-driven AST/visitor/binding code generator."
)]
pub struct AstgenArgs {
    /// Increase output verbosity (-v for info, -vv for debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Full pipeline: load, validate, generate, and emit all three
    /// artifact families.
    Generate {
        /// Path to the YAML schema describing the AST node types.
        #[arg(long)]
        schema: PathBuf,
        /// Output location for the AST class artifacts.
        #[arg(long)]
        ast_dir: PathBuf,
        /// Output location for the visitor artifacts.
        #[arg(long)]
        visitor_dir: PathBuf,
        /// Output location for the binding artifacts.
        #[arg(long)]
        binding_dir: PathBuf,
    },
    /// Load and validate a schema without generating anything.
    Check {
        /// Path to the YAML schema to validate.
        #[arg(required = true)]
        schema: PathBuf,
    },
    /// Print the validated schema model as JSON.
    Inspect {
        /// Path to the YAML schema to inspect.
        #[arg(required = true)]
        schema: PathBuf,
    },
}

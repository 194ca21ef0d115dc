//! CLI support for aipsql
//!
//! Provides programmatic access to the `aipsql` subcommands so other tools
//! can compile filters the same way the binary does.

mod compile;
mod convert;

pub use compile::{execute_compile, execute_tokens, CompileOptions, CompileResult};
pub use convert::{fragment_to_json, token_to_json, value_to_json};

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Lex error: {0}")]
    Lex(#[from] crate::LexError),

    #[error("Compile error: {0}")]
    Compile(#[from] crate::CompileError),

    #[error("Render error: {0}")]
    Render(#[from] crate::RenderError),

    #[error("Query error: {0}")]
    Query(#[from] crate::QueryError),

    #[error("{0}")]
    Config(#[from] crate::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No filter provided. Pass it as an argument or pipe it to stdin.")]
    NoInput,
}

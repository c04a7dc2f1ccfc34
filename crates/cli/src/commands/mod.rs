//! CLI command implementations.

use std::io::Write;

use serde::Serialize;
use thiserror::Error;

pub mod quote;
pub mod state;
pub mod watch;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A file could not be read, or output could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input was not valid JSON for the expected shape.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// State layer failure.
    #[error(transparent)]
    State(#[from] shopfront_state::StateError),

    /// Configuration failure.
    #[error("Configuration error: {0}")]
    Config(#[from] shopfront_state::ConfigError),
}

/// Pretty-print `value` as JSON on stdout.
pub fn write_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

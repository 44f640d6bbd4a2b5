//! CLI command implementations.

pub mod records;
pub mod sync;

use crate::error::{CliError, CliResult};

/// Output format of listing and reporting commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl Format {
    /// Parses a `--format` value.
    pub fn parse(value: &str) -> CliResult<Self> {
        match value {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            other => Err(CliError::UnsupportedFormat(other.to_string())),
        }
    }
}

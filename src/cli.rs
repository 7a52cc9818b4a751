//! CLI command implementations for Furrow.

pub(crate) mod check;
pub(crate) mod run;
pub(crate) mod show;
pub(crate) mod trial;

mod output;

use clap::ValueEnum;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;

/// Output format for the `run` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Output format for the `trial` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum TrialFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON output.
    Json,
    /// CSV format.
    Csv,
}

/// CLI error type.
#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
}

impl CliError {
    /// Create a new CLI error.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<furrow::StoreError> for CliError {
    fn from(e: furrow::StoreError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<furrow::config::ConfigError> for CliError {
    fn from(e: furrow::config::ConfigError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<furrow::trial::TrialError> for CliError {
    fn from(e: furrow::trial::TrialError) -> Self {
        Self::new(e.to_string())
    }
}

/// Read a script file.
fn read_script(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|e| CliError::new(format!("Failed to read {}: {e}", path.display())))
}

/// Random seed derived from the wall clock.
#[allow(clippy::cast_possible_truncation)]
fn default_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(42)
}

//! CLI error type.

use std::path::PathBuf;

use thiserror::Error;

use geofencing::config::ConfigError;
use geofencing::coord::CoordError;
use geofencing::fence::EvaluationError;
use geofencing::logging::LoggingError;
use geofencing::region::RegionFileError;
use geofencing::{InvalidRegionError, PositionSourceError};

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fence file error: {0}")]
    Fences(#[from] RegionFileError),

    #[error("Invalid fence '{identifier}': {source}")]
    InvalidFence {
        identifier: String,
        source: InvalidRegionError,
    },

    #[error("Track file {}: {}", .path.display(), .message)]
    Track { path: PathBuf, message: String },

    #[error("Invalid position: {0}")]
    InvalidPoint(#[from] CoordError),

    #[error("Fence evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Position source error: {0}")]
    Position(#[from] PositionSourceError),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("Failed to create Tokio runtime: {0}")]
    Runtime(std::io::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Fences(_) | CliError::Track { .. } => 2,
            CliError::InvalidPoint(_) => 2,
            CliError::InvalidFence { .. } | CliError::Evaluation(_) => 3,
            CliError::Position(_) => 4,
            CliError::Logging(_) | CliError::Runtime(_) => 1,
        }
    }
}

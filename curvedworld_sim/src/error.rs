//! Error types for the simulation harness.

use curvedworld_core::RotationError;
use thiserror::Error;

/// Errors that can occur while setting up or exporting a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    /// The engine rejected its configuration.
    #[error("Engine error: {0}")]
    Engine(#[from] RotationError),

    /// A motion profile parameter is unusable (negative or non-finite).
    #[error("Invalid motion profile: {0}")]
    InvalidProfile(String),

    /// Writing the export file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Export serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

//! Error types for the resus_core library.

use crate::types::InterventionStatus;
use std::io;
use uuid::Uuid;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for resus_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Template catalog validation error
    #[error("Template validation error: {0}")]
    TemplateValidation(String),

    /// Caller contract violation (e.g. non-positive weight passed to a
    /// dose calculation)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation referenced an unknown intervention id
    #[error("Intervention not found: {0}")]
    NotFound(Uuid),

    /// Operation not permitted in the intervention's current status
    #[error("Cannot {operation} intervention {id}: status is {status:?}")]
    InvalidState {
        id: Uuid,
        status: InterventionStatus,
        operation: &'static str,
    },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

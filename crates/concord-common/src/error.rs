//! Error types for Concord
//!
//! Provides a unified error type and domain-specific error variants.
//! Numeric input is never an error: out-of-range and non-finite values are
//! clamped or zeroed by the callers. Only missing identifiers, bad
//! configuration and infrastructure failures surface here.

use thiserror::Error;

/// Result type alias using ConcordError
pub type Result<T> = std::result::Result<T, ConcordError>;

/// Unified error type for Concord operations
#[derive(Debug, Error)]
pub enum ConcordError {
    // Input errors
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // The attribution actor has stopped
    #[error("Attribution engine unavailable: {0}")]
    EngineUnavailable(String),

    // Report sink failures
    #[error("Report sink error: {0}")]
    Sink(String),

    // Metrics registration errors
    #[error("Metrics error: {0}")]
    Metrics(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Caller-supplied input that cannot be processed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Missing required identifier: {field}")]
    MissingIdentifier { field: &'static str },
}

/// Configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("shapley_iterations must be at least 1")]
    ZeroIterations,

    #[error("{name} capacity must be at least 1")]
    ZeroCapacity { name: &'static str },

    #[error("Sigmoid midpoint must lie in [0, 1], got {0}")]
    MidpointOutOfRange(f64),

    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },
}

impl InputError {
    /// Ensure an identifier is present, trimming surrounding whitespace
    pub fn require(field: &'static str, value: &str) -> std::result::Result<(), InputError> {
        if value.trim().is_empty() {
            Err(InputError::MissingIdentifier { field })
        } else {
            Ok(())
        }
    }
}

// Implement From for common external error types
impl From<serde_json::Error> for ConcordError {
    fn from(err: serde_json::Error) -> Self {
        ConcordError::Serialization(err.to_string())
    }
}

impl From<prometheus::Error> for ConcordError {
    fn from(err: prometheus::Error) -> Self {
        ConcordError::Metrics(err.to_string())
    }
}

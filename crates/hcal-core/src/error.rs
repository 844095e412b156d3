//! Error types for hcal-core.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument or value
    #[error("Validation error: {0}")]
    Validation(String),

    /// Histograms with incompatible axes were merged
    #[error("Histogram mismatch: {0}")]
    HistogramMismatch(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

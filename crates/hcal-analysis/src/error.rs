//! Error types for hcal-analysis.

use thiserror::Error;

/// Analysis error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Histogram or accumulator error
    #[error(transparent)]
    Core(#[from] hcal_core::Error),

    /// ROOT file error
    #[error("ROOT error: {0}")]
    Root(#[from] hcal_root::RootError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// A required branch or column is absent from an input file
    #[error("missing column '{column}' in {path}")]
    MissingColumn { path: String, column: String },

    /// Bad input file list, path or URL
    #[error("Input error: {0}")]
    Input(String),

    /// Failure while scheduling or running chunks
    #[error("Execution error: {0}")]
    Execution(String),

    /// Inconsistent event data
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

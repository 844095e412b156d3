//! Error types for ROOT file reading.

use thiserror::Error;

/// Errors raised while parsing a ROOT file.
#[derive(Error, Debug)]
pub enum RootError {
    /// Underlying I/O failure (open, mmap).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File does not start with the `root` magic.
    #[error("not a ROOT file (bad magic)")]
    BadMagic,

    /// A read ran past the end of a buffer.
    #[error("buffer underflow at offset {offset}: need {need} bytes, have {have}")]
    BufferUnderflow {
        /// Read position.
        offset: usize,
        /// Bytes requested.
        need: usize,
        /// Bytes available.
        have: usize,
    },

    /// Malformed streamer data.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Compressed block could not be decoded.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Key exists but is not a TTree.
    #[error("tree not found: {0}")]
    TreeNotFound(String),

    /// Tree has no branch with this name.
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// Branch layout does not support the requested access.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}

/// Result alias for ROOT reading.
pub type Result<T> = std::result::Result<T, RootError>;

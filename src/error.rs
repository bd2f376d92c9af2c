//! Error types for blockdex.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`BlockdexError`] enum.
//!
//! # Examples
//!
//! ```
//! use blockdex::error::{BlockdexError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(BlockdexError::invalid_config("block threshold must be positive"))
//! }
//!
//! assert!(example_operation().is_err());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for blockdex operations.
#[derive(Error, Debug)]
pub enum BlockdexError {
    /// I/O errors (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Index construction or lookup errors
    #[error("Index error: {0}")]
    Index(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Query-related errors
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with BlockdexError.
pub type Result<T> = std::result::Result<T, BlockdexError>;

impl BlockdexError {
    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        BlockdexError::Index(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        BlockdexError::Storage(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        BlockdexError::Query(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        BlockdexError::Config(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        BlockdexError::Serialization(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        BlockdexError::Other(format!("Internal error: {}", msg.into()))
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        BlockdexError::Other(msg.into())
    }
}

impl From<bincode::Error> for BlockdexError {
    fn from(err: bincode::Error) -> Self {
        BlockdexError::serialization(err.to_string())
    }
}

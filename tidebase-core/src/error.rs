// tidebase-core/src/error.rs
// Error taxonomy for the TideBase engine

use thiserror::Error;

/// Engine errors, grouped by kind rather than by origin.
///
/// Read paths signal absence through `Option`/`bool` return values; the
/// `CollectionNotFound`/`DocumentNotFound` variants exist for consumers
/// (CLI, future transports) that need a typed not-found error.
#[derive(Error, Debug)]
pub enum TideBaseError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// The predicate engine could not parse a `where` clause.
    /// Carries the offending clause.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A snapshot file exists but cannot be decoded.
    #[error("Snapshot corruption: {0}")]
    Corruption(String),
}

impl From<serde_json::Error> for TideBaseError {
    fn from(err: serde_json::Error) -> Self {
        TideBaseError::Serialization(err.to_string())
    }
}

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, TideBaseError>;

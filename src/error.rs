//! Error types for the Puku core

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("invalid page range {start}..={end} (document has {page_count} pages)")]
    InvalidRange {
        start: u32,
        end: u32,
        page_count: u32,
    },

    #[error("page {page} out of range (document has {page_count} pages)")]
    OutOfRange { page: u32, page_count: u32 },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("metadata extraction failed: {0}")]
    Metadata(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("S3 SDK error: {0}")]
    SdkError(String),
}

impl Error {
    /// True when the error is the storage layer reporting a missing object.
    ///
    /// Cache-miss detection relies on this; every other storage failure must
    /// propagate unchanged.
    pub fn is_object_not_found(&self) -> bool {
        matches!(self, Error::Storage(StorageError::ObjectNotFound(_)))
    }
}

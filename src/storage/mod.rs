//! Storage module for S3-compatible backends
//!
//! Supports MinIO, Cloudflare R2, Backblaze B2, and AWS S3 through one
//! [`ObjectStore`] trait, plus an in-memory implementation for tests and
//! embedded use.

mod memory;
mod s3;

pub use memory::MemoryStorage;
pub use s3::S3Storage;

use async_trait::async_trait;

use crate::error::Result;

/// Binary blob store collaborator.
///
/// Merged PDFs and generated thumbnails both live behind this seam; its
/// failures surface as [`crate::StorageError`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object, overwriting any existing one under the same key.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Fetch an object. Missing keys report `StorageError::ObjectNotFound`.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Produce a time-boxed read URL for an object.
    async fn signed_url(&self, key: &str, ttl_secs: u64) -> Result<String>;
}

/// Storage key of an arrangement's merged PDF.
pub fn arrangement_key(arrangement_id: &str) -> String {
    format!("arrangements/{}.pdf", arrangement_id)
}

/// Storage key of a page thumbnail.
///
/// Keyed by `(document, page)` rather than by part id: two parts that share a
/// start page share one cached render.
pub fn thumbnail_key(document_id: &str, page: u32) -> String {
    format!("thumbnails/{}/{}.jpg", document_id, page)
}

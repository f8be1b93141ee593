//! Thumbnail generation and caching
//!
//! Derives a JPEG preview for a page of a document (or for a part, via its
//! start page) and reuses it on subsequent requests. Renders go through the
//! [`PageRasterizer`] seam; persisted images live in the injected
//! [`crate::storage::ObjectStore`] with a small in-memory LRU in front.

mod cache;
mod rasterizer;

pub use cache::{ThumbnailCache, ThumbnailKey};
#[cfg(feature = "render-mupdf")]
pub use rasterizer::MupdfRasterizer;
pub use rasterizer::PageRasterizer;

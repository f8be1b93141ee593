//! Thumbnail cache with single-flight render coalescing
//!
//! Cache keys are `(document id, page)`: a part is looked up through its start
//! page, so two parts sharing a start page share one cached render. Concurrent
//! misses for the same key serialize on a per-key async mutex; whoever enters
//! first renders, everyone behind it re-checks and finds the result. A failed
//! or cancelled render writes nothing, so the next request retries from
//! scratch. Distinct keys never contend.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use sqlx::SqlitePool;
use tokio::time::{timeout, Duration};

use crate::config::ThumbnailConfig;
use crate::db::{Part, PartRepository};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::storage::{thumbnail_key, ObjectStore};

use super::rasterizer::PageRasterizer;

/// Cache key for rendered page thumbnails.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ThumbnailKey {
    pub document_id: String,
    pub page: u32,
}

impl ThumbnailKey {
    pub fn new(document_id: &str, page: u32) -> Self {
        Self {
            document_id: document_id.to_string(),
            page,
        }
    }

    /// Storage key of the persisted JPEG for this cache key.
    pub fn storage_key(&self) -> String {
        thumbnail_key(&self.document_id, self.page)
    }
}

/// Thread-safe thumbnail cache
#[derive(Clone)]
pub struct ThumbnailCache {
    store: Arc<dyn ObjectStore>,
    rasterizer: Arc<dyn PageRasterizer>,
    pool: SqlitePool,
    /// In-memory layer in front of the object store
    memory: Arc<Mutex<LruCache<ThumbnailKey, Arc<Vec<u8>>>>>,
    /// Per-key guards serializing concurrent misses
    in_flight: Arc<Mutex<HashMap<ThumbnailKey, Arc<tokio::sync::Mutex<()>>>>>,
    jpeg_quality: u8,
    max_size: u32,
    signed_url_ttl_secs: u64,
    render_timeout: Duration,
}

impl ThumbnailCache {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        rasterizer: Arc<dyn PageRasterizer>,
        pool: SqlitePool,
        config: &ThumbnailConfig,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.cache_entries)
            .unwrap_or_else(|| NonZeroUsize::new(100).unwrap());

        Self {
            store,
            rasterizer,
            pool,
            memory: Arc::new(Mutex::new(LruCache::new(capacity))),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            jpeg_quality: config.jpeg_quality,
            max_size: config.max_size,
            signed_url_ttl_secs: config.signed_url_ttl_secs,
            render_timeout: Duration::from_secs(config.render_timeout_secs),
        }
    }

    /// Return the thumbnail for a page, rendering and persisting it on miss.
    pub async fn get_or_create_for_page(&self, document: &Document, page: u32) -> Result<Vec<u8>> {
        let key = ThumbnailKey::new(document.id(), page);

        if let Some(bytes) = self.memory_get(&key) {
            tracing::debug!(document_id = %key.document_id, page, "thumbnail memory hit");
            return Ok(bytes);
        }

        // Serialize misses per key; distinct keys proceed in parallel.
        let flight = {
            let mut in_flight = self.in_flight.lock();
            in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let guard = flight.lock().await;
        let result = self.load_or_render(&key, document, page).await;
        drop(guard);

        // Entry removal is cosmetic; waiters still holding the Arc proceed.
        self.in_flight.lock().remove(&key);

        result
    }

    /// Return the thumbnail for a part, using its start page as the
    /// representative page. Records `preview_path` on first success.
    pub async fn get_or_create_for_part(&self, document: &Document, part: &Part) -> Result<Vec<u8>> {
        let bytes = self.get_or_create_for_page(document, part.start_page).await?;

        if part.preview_path.is_none() {
            let storage_key = thumbnail_key(document.id(), part.start_page);
            PartRepository::new(&self.pool)
                .set_preview_path(&part.id, &storage_key)
                .await?;
            tracing::debug!(part_id = %part.id, storage_key, "part preview path recorded");
        }

        Ok(bytes)
    }

    /// Drop the cached thumbnail for a page; the next request regenerates it.
    pub async fn invalidate_page(&self, document_id: &str, page: u32) -> Result<()> {
        let key = ThumbnailKey::new(document_id, page);
        self.memory.lock().pop(&key);
        self.store.delete(&key.storage_key()).await?;
        tracing::debug!(document_id, page, "thumbnail invalidated");
        Ok(())
    }

    /// Drop the cached thumbnail behind a part's representative page.
    ///
    /// Another part sharing the same start page will regenerate the shared
    /// render on its next request; invalidation never breaks it permanently.
    pub async fn invalidate_part(&self, document_id: &str, part: &Part) -> Result<()> {
        self.invalidate_page(document_id, part.start_page).await
    }

    /// Time-boxed serving URL for a page thumbnail.
    pub async fn signed_url_for_page(&self, document_id: &str, page: u32) -> Result<String> {
        self.store
            .signed_url(
                &thumbnail_key(document_id, page),
                self.signed_url_ttl_secs,
            )
            .await
    }

    /// Time-boxed serving URL for a part's thumbnail.
    pub async fn signed_url_for_part(&self, document_id: &str, part: &Part) -> Result<String> {
        self.signed_url_for_page(document_id, part.start_page).await
    }

    /// Runs under the per-key in-flight guard.
    async fn load_or_render(
        &self,
        key: &ThumbnailKey,
        document: &Document,
        page: u32,
    ) -> Result<Vec<u8>> {
        // A waiter that queued behind the renderer finds the result here.
        if let Some(bytes) = self.memory_get(key) {
            return Ok(bytes);
        }

        let storage_key = key.storage_key();
        match self.store.get(&storage_key).await {
            Ok(bytes) => {
                tracing::debug!(storage_key, "thumbnail store hit");
                self.memory_put(key, &bytes);
                return Ok(bytes);
            }
            Err(err) if err.is_object_not_found() => {}
            Err(err) => return Err(err),
        }

        tracing::debug!(storage_key, "thumbnail miss, rendering");
        let page_pdf = document.extract_single_page(page)?;

        let rasterizer = Arc::clone(&self.rasterizer);
        let quality = self.jpeg_quality;
        let max_size = self.max_size;
        let render = timeout(
            self.render_timeout,
            tokio::task::spawn_blocking(move || rasterizer.rasterize(&page_pdf, quality, max_size)),
        )
        .await;

        let jpeg = match render {
            Ok(join_result) => join_result
                .map_err(|e| Error::Render(format!("render task join error: {}", e)))??,
            Err(_) => {
                return Err(Error::Render(format!(
                    "rendering page {} timed out after {}s",
                    page,
                    self.render_timeout.as_secs()
                )))
            }
        };

        // Persist before admitting to memory; a failed upload must leave the
        // key absent.
        self.store
            .put(&storage_key, jpeg.clone(), "image/jpeg")
            .await?;
        self.memory_put(key, &jpeg);

        Ok(jpeg)
    }

    fn memory_get(&self, key: &ThumbnailKey) -> Option<Vec<u8>> {
        self.memory.lock().get(key).map(|bytes| (**bytes).clone())
    }

    fn memory_put(&self, key: &ThumbnailKey, bytes: &[u8]) {
        self.memory
            .lock()
            .put(key.clone(), Arc::new(bytes.to_vec()));
    }

    /// (len, capacity) of the in-memory layer.
    pub fn memory_stats(&self) -> (usize, usize) {
        let memory = self.memory.lock();
        (memory.len(), memory.cap().get())
    }
}

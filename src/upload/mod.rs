//! Arrangement upload pipeline
//!
//! Turns one or more uploaded PDFs into a stored arrangement: create the
//! record, merge the files into a single document, persist it, record the file
//! path and page count, and generate the page-1 thumbnail. Progress is
//! reported as discrete stage transitions through a synchronous callback.
//!
//! Deletion is the inverse walk: remove the record (part rows cascade), then
//! best-effort cleanup of the stored PDF and thumbnails — storage failures are
//! logged, never propagated, so a half-reachable store cannot wedge deletes.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{Arrangement, ArrangementRepository, NewArrangement, PartRepository};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::storage::{arrangement_key, thumbnail_key, ObjectStore};
use crate::thumbnail::ThumbnailCache;

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStage {
    Creating,
    Merging,
    Uploading,
    Updating,
    GeneratingThumbnail,
    Completed,
}

/// One progress event.
#[derive(Debug, Clone, Serialize)]
pub struct UploadProgress {
    pub stage: UploadStage,
    pub message: String,
    pub percent: u8,
}

/// Outcome of a completed upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub arrangement_id: String,
    pub file_path: String,
    pub page_count: u32,
}

/// Drives the upload/delete lifecycle of arrangements.
#[derive(Clone)]
pub struct Uploader {
    pool: SqlitePool,
    store: Arc<dyn ObjectStore>,
    thumbnails: ThumbnailCache,
}

impl Uploader {
    pub fn new(pool: SqlitePool, store: Arc<dyn ObjectStore>, thumbnails: ThumbnailCache) -> Self {
        Self {
            pool,
            store,
            thumbnails,
        }
    }

    /// Run the full pipeline. `on_progress` observes each stage transition.
    pub async fn upload_arrangement(
        &self,
        new: NewArrangement,
        files: Vec<Vec<u8>>,
        mut on_progress: impl FnMut(UploadProgress),
    ) -> Result<UploadResult> {
        if files.is_empty() {
            return Err(Error::Validation("at least one PDF file is required".into()));
        }

        let mut report = |stage, message: &str, percent| {
            on_progress(UploadProgress {
                stage,
                message: message.to_string(),
                percent,
            })
        };

        report(UploadStage::Creating, "Creating arrangement...", 10);
        let arrangements = ArrangementRepository::new(&self.pool);
        let arrangement = arrangements.create(&new).await?;

        report(UploadStage::Merging, "Merging PDF files...", 30);
        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            documents.push(Document::load(file)?);
        }
        let merged = Document::merge(&documents)?.with_id(arrangement.id.clone());

        report(UploadStage::Uploading, "Uploading merged score...", 60);
        let file_path = arrangement_key(&arrangement.id);
        self.store
            .put(&file_path, merged.bytes().to_vec(), "application/pdf")
            .await?;

        report(UploadStage::Updating, "Updating arrangement record...", 80);
        arrangements
            .update_file_path(&arrangement.id, &file_path, merged.page_count())
            .await?;

        report(
            UploadStage::GeneratingThumbnail,
            "Generating thumbnail...",
            90,
        );
        if merged.page_count() > 0 {
            // A failed render degrades to a placeholder downstream; it never
            // fails the upload.
            match self.thumbnails.get_or_create_for_page(&merged, 1).await {
                Ok(_) => {
                    arrangements
                        .update_preview_path(&arrangement.id, &thumbnail_key(merged.id(), 1))
                        .await?;
                }
                Err(err) => {
                    tracing::warn!(arrangement_id = %arrangement.id, %err, "thumbnail generation failed");
                }
            }
        }

        report(UploadStage::Completed, "Upload completed", 100);
        tracing::info!(
            arrangement_id = %arrangement.id,
            page_count = merged.page_count(),
            "arrangement uploaded"
        );

        Ok(UploadResult {
            arrangement_id: arrangement.id,
            file_path,
            page_count: merged.page_count(),
        })
    }

    /// Load an arrangement's merged PDF back from storage.
    pub async fn load_document(&self, arrangement: &Arrangement) -> Result<Document> {
        let file_path = arrangement
            .file_path
            .as_deref()
            .ok_or_else(|| Error::NotFound(format!("arrangement {} has no file", arrangement.id)))?;
        let bytes = self.store.get(file_path).await?;
        Document::load_with_id(bytes, arrangement.id.clone())
    }

    /// Delete an arrangement and clean up its stored blobs.
    pub async fn delete_arrangement(&self, arrangement_id: &str) -> Result<()> {
        let arrangements = ArrangementRepository::new(&self.pool);
        let arrangement = arrangements.get(arrangement_id).await?;
        let parts = PartRepository::new(&self.pool)
            .list_by_arrangement(arrangement_id)
            .await?;

        // Record first; parts cascade with it.
        arrangements.delete(arrangement_id).await?;

        // Best-effort blob cleanup.
        if let Some(file_path) = arrangement.file_path.as_deref() {
            if let Err(err) = self.store.delete(file_path).await {
                tracing::warn!(arrangement_id, %err, "failed to delete stored PDF");
            }
        }

        let mut pages: BTreeSet<u32> = parts.iter().map(|p| p.start_page).collect();
        pages.insert(1); // arrangement-level thumbnail
        for page in pages {
            if let Err(err) = self.thumbnails.invalidate_page(arrangement_id, page).await {
                tracing::warn!(arrangement_id, page, %err, "failed to delete thumbnail");
            }
        }

        Ok(())
    }

    /// Delete a part and, when no surviving part shares its representative
    /// page, drop the now-orphaned thumbnail.
    pub async fn delete_part(&self, part_id: &str) -> Result<()> {
        let parts = PartRepository::new(&self.pool);
        let part = parts.get(part_id).await?;
        parts.delete(part_id).await?;

        let survivors = parts.list_by_arrangement(&part.arrangement_id).await?;
        let page_still_used =
            part.start_page == 1 || survivors.iter().any(|p| p.start_page == part.start_page);
        if !page_still_used {
            if let Err(err) = self
                .thumbnails
                .invalidate_page(&part.arrangement_id, part.start_page)
                .await
            {
                tracing::warn!(part_id, %err, "failed to delete part thumbnail");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThumbnailConfig;
    use crate::db::test_pool;
    use crate::storage::MemoryStorage;
    use crate::test_support::sample_pdf;
    use crate::thumbnail::PageRasterizer;

    struct StubRasterizer;

    impl PageRasterizer for StubRasterizer {
        fn rasterize(&self, _pdf_bytes: &[u8], _quality: u8, _max_size: u32) -> Result<Vec<u8>> {
            Ok(vec![0xFF, 0xD8, 0xFF])
        }
    }

    struct FailingRasterizer;

    impl PageRasterizer for FailingRasterizer {
        fn rasterize(&self, _pdf_bytes: &[u8], _quality: u8, _max_size: u32) -> Result<Vec<u8>> {
            Err(Error::Render("no renderer available".into()))
        }
    }

    async fn uploader_with(
        rasterizer: Arc<dyn PageRasterizer>,
    ) -> (Uploader, MemoryStorage, SqlitePool) {
        let pool = test_pool().await;
        let store = MemoryStorage::new();
        let cache = ThumbnailCache::new(
            Arc::new(store.clone()),
            rasterizer,
            pool.clone(),
            &ThumbnailConfig::default(),
        );
        (
            Uploader::new(pool.clone(), Arc::new(store.clone()), cache),
            store,
            pool,
        )
    }

    fn new_arrangement() -> NewArrangement {
        NewArrangement {
            title: "The Planets".into(),
            composers: vec!["Gustav Holst".into()],
            ensemble_type: Some("Orchestra".into()),
            owner_id: None,
        }
    }

    #[tokio::test]
    async fn pipeline_reports_stages_in_order() {
        let (uploader, store, pool) = uploader_with(Arc::new(StubRasterizer)).await;

        let mut stages = Vec::new();
        let result = uploader
            .upload_arrangement(
                new_arrangement(),
                vec![sample_pdf(3), sample_pdf(2)],
                |progress| stages.push((progress.stage, progress.percent)),
            )
            .await
            .unwrap();

        let order: Vec<UploadStage> = stages.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            order,
            vec![
                UploadStage::Creating,
                UploadStage::Merging,
                UploadStage::Uploading,
                UploadStage::Updating,
                UploadStage::GeneratingThumbnail,
                UploadStage::Completed,
            ]
        );
        assert!(stages.windows(2).all(|w| w[0].1 <= w[1].1));

        assert_eq!(result.page_count, 5);
        assert!(store.contains(&result.file_path).await);

        let arrangement = ArrangementRepository::new(&pool)
            .get(&result.arrangement_id)
            .await
            .unwrap();
        assert_eq!(arrangement.page_count, 5);
        assert_eq!(arrangement.file_path.as_deref(), Some(result.file_path.as_str()));
        assert_eq!(
            arrangement.preview_path.as_deref(),
            Some(thumbnail_key(&result.arrangement_id, 1).as_str())
        );
    }

    #[tokio::test]
    async fn thumbnail_failure_degrades_without_failing_the_upload() {
        let (uploader, store, pool) = uploader_with(Arc::new(FailingRasterizer)).await;

        let result = uploader
            .upload_arrangement(new_arrangement(), vec![sample_pdf(2)], |_| {})
            .await
            .unwrap();

        assert!(store.contains(&result.file_path).await);
        let arrangement = ArrangementRepository::new(&pool)
            .get(&result.arrangement_id)
            .await
            .unwrap();
        assert!(arrangement.preview_path.is_none());
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let (uploader, _, _) = uploader_with(Arc::new(StubRasterizer)).await;
        assert!(matches!(
            uploader
                .upload_arrangement(new_arrangement(), vec![], |_| {})
                .await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn load_document_round_trips() {
        let (uploader, _, pool) = uploader_with(Arc::new(StubRasterizer)).await;
        let result = uploader
            .upload_arrangement(new_arrangement(), vec![sample_pdf(4)], |_| {})
            .await
            .unwrap();

        let arrangement = ArrangementRepository::new(&pool)
            .get(&result.arrangement_id)
            .await
            .unwrap();
        let document = uploader.load_document(&arrangement).await.unwrap();
        assert_eq!(document.page_count(), 4);
        assert_eq!(document.id(), result.arrangement_id);
    }

    #[tokio::test]
    async fn delete_arrangement_cleans_up_blobs() {
        let (uploader, store, pool) = uploader_with(Arc::new(StubRasterizer)).await;
        let result = uploader
            .upload_arrangement(new_arrangement(), vec![sample_pdf(4)], |_| {})
            .await
            .unwrap();

        PartRepository::new(&pool)
            .create(&result.arrangement_id, 2, 4, "Flute I", None)
            .await
            .unwrap();

        uploader
            .delete_arrangement(&result.arrangement_id)
            .await
            .unwrap();

        assert!(!store.contains(&result.file_path).await);
        assert!(
            !store
                .contains(&thumbnail_key(&result.arrangement_id, 1))
                .await
        );
        assert!(matches!(
            ArrangementRepository::new(&pool)
                .get(&result.arrangement_id)
                .await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_part_drops_orphaned_thumbnail_only() {
        let (uploader, store, pool) = uploader_with(Arc::new(StubRasterizer)).await;
        let result = uploader
            .upload_arrangement(new_arrangement(), vec![sample_pdf(6)], |_| {})
            .await
            .unwrap();

        let parts = PartRepository::new(&pool);
        let solo = parts
            .create(&result.arrangement_id, 3, 4, "Oboe", None)
            .await
            .unwrap();
        let shared_a = parts
            .create(&result.arrangement_id, 5, 6, "Flute I", None)
            .await
            .unwrap();
        let shared_b = parts
            .create(&result.arrangement_id, 5, 5, "Flute II", None)
            .await
            .unwrap();

        // Render all part thumbnails.
        let arrangement = ArrangementRepository::new(&pool)
            .get(&result.arrangement_id)
            .await
            .unwrap();
        let document = uploader.load_document(&arrangement).await.unwrap();
        for part in [&solo, &shared_a, &shared_b] {
            uploader
                .thumbnails
                .get_or_create_for_part(&document, part)
                .await
                .unwrap();
        }

        // Deleting one of two parts on page 5 keeps the shared thumbnail.
        uploader.delete_part(&shared_a.id).await.unwrap();
        assert!(
            store
                .contains(&thumbnail_key(&result.arrangement_id, 5))
                .await
        );

        // Deleting the only part on page 3 drops its thumbnail.
        uploader.delete_part(&solo.id).await.unwrap();
        assert!(
            !store
                .contains(&thumbnail_key(&result.arrangement_id, 3))
                .await
        );
    }
}

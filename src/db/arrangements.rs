//! Arrangement record operations

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{Error, Result};

/// A stored arrangement: one merged, paginated score.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Arrangement {
    pub id: String,
    pub title: String,
    pub composers: Json<Vec<String>>,
    pub ensemble_type: Option<String>,
    pub owner_id: Option<String>,
    pub file_path: Option<String>,
    pub preview_path: Option<String>,
    pub page_count: u32,
    pub visibility: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields required to create an arrangement record.
#[derive(Debug, Clone, Deserialize)]
pub struct NewArrangement {
    pub title: String,
    pub composers: Vec<String>,
    pub ensemble_type: Option<String>,
    pub owner_id: Option<String>,
}

/// Arrangement repository
pub struct ArrangementRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ArrangementRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new arrangement. The file path and page count stay unset until
    /// the upload pipeline has merged and stored the PDF.
    pub async fn create(&self, new: &NewArrangement) -> Result<Arrangement> {
        if new.title.trim().is_empty() {
            return Err(Error::Validation("arrangement title is required".into()));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO arrangements (id, title, composers, ensemble_type, owner_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(new.title.trim())
        .bind(Json(&new.composers))
        .bind(&new.ensemble_type)
        .bind(&new.owner_id)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        tracing::info!(arrangement_id = %id, title = %new.title, "arrangement created");
        self.get(&id).await
    }

    /// Fetch an arrangement by id.
    pub async fn get(&self, arrangement_id: &str) -> Result<Arrangement> {
        sqlx::query_as::<_, Arrangement>(
            r#"
            SELECT id, title, composers, ensemble_type, owner_id, file_path,
                   preview_path, page_count, visibility, created_at, updated_at
            FROM arrangements
            WHERE id = ?
            "#,
        )
        .bind(arrangement_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("arrangement {}", arrangement_id)))
    }

    /// All arrangements of one owner, newest first.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Arrangement>> {
        let arrangements = sqlx::query_as::<_, Arrangement>(
            r#"
            SELECT id, title, composers, ensemble_type, owner_id, file_path,
                   preview_path, page_count, visibility, created_at, updated_at
            FROM arrangements
            WHERE owner_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?;

        Ok(arrangements)
    }

    /// Record the storage key and page count of the merged PDF.
    pub async fn update_file_path(
        &self,
        arrangement_id: &str,
        file_path: &str,
        page_count: u32,
    ) -> Result<()> {
        self.touch(
            arrangement_id,
            sqlx::query(
                "UPDATE arrangements SET file_path = ?, page_count = ?, updated_at = ? WHERE id = ?",
            )
            .bind(file_path)
            .bind(page_count)
            .bind(Utc::now().to_rfc3339())
            .bind(arrangement_id),
        )
        .await
    }

    /// Record the storage key of the arrangement-level thumbnail.
    pub async fn update_preview_path(
        &self,
        arrangement_id: &str,
        preview_path: &str,
    ) -> Result<()> {
        self.touch(
            arrangement_id,
            sqlx::query("UPDATE arrangements SET preview_path = ?, updated_at = ? WHERE id = ?")
                .bind(preview_path)
                .bind(Utc::now().to_rfc3339())
                .bind(arrangement_id),
        )
        .await
    }

    pub async fn rename(&self, arrangement_id: &str, title: &str) -> Result<()> {
        if title.trim().is_empty() {
            return Err(Error::Validation("arrangement title is required".into()));
        }
        self.touch(
            arrangement_id,
            sqlx::query("UPDATE arrangements SET title = ?, updated_at = ? WHERE id = ?")
                .bind(title.trim())
                .bind(Utc::now().to_rfc3339())
                .bind(arrangement_id),
        )
        .await
    }

    /// Delete the record; part rows cascade. Storage blobs are the caller's
    /// responsibility (see `Uploader::delete_arrangement`).
    pub async fn delete(&self, arrangement_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM arrangements WHERE id = ?")
            .bind(arrangement_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("arrangement {}", arrangement_id)));
        }

        tracing::info!(arrangement_id, "arrangement deleted");
        Ok(())
    }

    async fn touch<'q>(
        &self,
        arrangement_id: &str,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> Result<()> {
        let result = query.execute(self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("arrangement {}", arrangement_id)));
        }
        Ok(())
    }
}

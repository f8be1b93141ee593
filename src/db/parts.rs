//! Part record operations
//!
//! A part is a named, categorized, inclusive page range within an arrangement,
//! e.g. one instrument's music carved out of the merged score. Ranges of
//! different parts may overlap; a "Full Score" part typically spans every page
//! that an individual part also covers.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::document::check_range;
use crate::error::{Error, Result};

/// A stored part.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Part {
    pub id: String,
    pub arrangement_id: String,
    pub label: String,
    pub category: Option<String>,
    pub start_page: u32,
    pub end_page: u32,
    pub preview_path: Option<String>,
    pub created_at: String,
}

/// Part repository
pub struct PartRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PartRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a part over `start_page..=end_page` of an arrangement.
    ///
    /// The range is validated against the arrangement's stored page count;
    /// a blank label is rejected before anything touches the database.
    pub async fn create(
        &self,
        arrangement_id: &str,
        start_page: u32,
        end_page: u32,
        label: &str,
        category: Option<&str>,
    ) -> Result<Part> {
        let label = label.trim();
        if label.is_empty() {
            return Err(Error::Validation("part label is required".into()));
        }

        let page_count = self.arrangement_page_count(arrangement_id).await?;
        check_range(start_page, end_page, page_count)?;

        let part = Part {
            id: Uuid::new_v4().to_string(),
            arrangement_id: arrangement_id.to_string(),
            label: label.to_string(),
            category: normalize_category(category),
            start_page,
            end_page,
            preview_path: None,
            created_at: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            r#"
            INSERT INTO parts (id, arrangement_id, label, category, start_page, end_page, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&part.id)
        .bind(&part.arrangement_id)
        .bind(&part.label)
        .bind(&part.category)
        .bind(part.start_page)
        .bind(part.end_page)
        .bind(&part.created_at)
        .execute(self.pool)
        .await?;

        tracing::info!(
            part_id = %part.id,
            arrangement_id,
            label = %part.label,
            start_page,
            end_page,
            "part created"
        );
        Ok(part)
    }

    /// Fetch a part by id.
    pub async fn get(&self, part_id: &str) -> Result<Part> {
        sqlx::query_as::<_, Part>(
            r#"
            SELECT id, arrangement_id, label, category, start_page, end_page,
                   preview_path, created_at
            FROM parts
            WHERE id = ?
            "#,
        )
        .bind(part_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("part {}", part_id)))
    }

    /// Delete a part. Any cached thumbnail stays; callers invalidate it
    /// explicitly when appropriate.
    pub async fn delete(&self, part_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM parts WHERE id = ?")
            .bind(part_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("part {}", part_id)));
        }

        tracing::info!(part_id, "part deleted");
        Ok(())
    }

    /// All parts of an arrangement, ordered by ascending start page.
    ///
    /// Ties keep insertion order; presentation layers rely on this to render
    /// parts top-to-bottom in document order.
    pub async fn list_by_arrangement(&self, arrangement_id: &str) -> Result<Vec<Part>> {
        let parts = sqlx::query_as::<_, Part>(
            r#"
            SELECT id, arrangement_id, label, category, start_page, end_page,
                   preview_path, created_at
            FROM parts
            WHERE arrangement_id = ?
            ORDER BY start_page ASC, rowid ASC
            "#,
        )
        .bind(arrangement_id)
        .fetch_all(self.pool)
        .await?;

        Ok(parts)
    }

    /// Distinct non-null categories across an arrangement's parts, sorted
    /// lexicographically. Derived on every read, never cached.
    pub async fn list_categories(&self, arrangement_id: &str) -> Result<Vec<String>> {
        let categories = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT category
            FROM parts
            WHERE arrangement_id = ? AND category IS NOT NULL
            ORDER BY category ASC
            "#,
        )
        .bind(arrangement_id)
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }

    /// Set or clear a part's category. Empty and whitespace-only clear it.
    pub async fn set_category(&self, part_id: &str, category: Option<&str>) -> Result<()> {
        let result = sqlx::query("UPDATE parts SET category = ? WHERE id = ?")
            .bind(normalize_category(category))
            .bind(part_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("part {}", part_id)));
        }
        Ok(())
    }

    pub async fn rename(&self, part_id: &str, label: &str) -> Result<()> {
        let label = label.trim();
        if label.is_empty() {
            return Err(Error::Validation("part label is required".into()));
        }

        let result = sqlx::query("UPDATE parts SET label = ? WHERE id = ?")
            .bind(label)
            .bind(part_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("part {}", part_id)));
        }
        Ok(())
    }

    /// Move a part to a new page range, validated like creation.
    pub async fn update_range(&self, part_id: &str, start_page: u32, end_page: u32) -> Result<()> {
        let part = self.get(part_id).await?;
        let page_count = self.arrangement_page_count(&part.arrangement_id).await?;
        check_range(start_page, end_page, page_count)?;

        sqlx::query("UPDATE parts SET start_page = ?, end_page = ? WHERE id = ?")
            .bind(start_page)
            .bind(end_page)
            .bind(part_id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Record the storage key of the part's thumbnail. Called by the thumbnail
    /// cache only after the image has been persisted.
    pub async fn set_preview_path(&self, part_id: &str, preview_path: &str) -> Result<()> {
        let result = sqlx::query("UPDATE parts SET preview_path = ? WHERE id = ?")
            .bind(preview_path)
            .bind(part_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("part {}", part_id)));
        }
        Ok(())
    }

    async fn arrangement_page_count(&self, arrangement_id: &str) -> Result<u32> {
        sqlx::query_scalar::<_, u32>("SELECT page_count FROM arrangements WHERE id = ?")
            .bind(arrangement_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("arrangement {}", arrangement_id)))
    }
}

fn normalize_category(category: Option<&str>) -> Option<String> {
    category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

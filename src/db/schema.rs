//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Arrangements table (one merged score per row)
CREATE TABLE IF NOT EXISTS arrangements (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    composers TEXT NOT NULL DEFAULT '[]',
    ensemble_type TEXT,
    owner_id TEXT,
    -- Storage key of the merged PDF; NULL until the upload pipeline finishes
    file_path TEXT,
    -- Storage key of the page-1 thumbnail; NULL until first generated
    preview_path TEXT,
    page_count INTEGER NOT NULL DEFAULT 0,
    visibility TEXT NOT NULL DEFAULT 'private',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_arrangements_owner ON arrangements(owner_id);
CREATE INDEX IF NOT EXISTS idx_arrangements_title ON arrangements(title);

-- Parts table (named, categorized page ranges within an arrangement)
CREATE TABLE IF NOT EXISTS parts (
    id TEXT PRIMARY KEY,
    arrangement_id TEXT NOT NULL REFERENCES arrangements(id) ON DELETE CASCADE,
    label TEXT NOT NULL,
    category TEXT,
    -- 1-based inclusive page range; ranges of different parts may overlap
    start_page INTEGER NOT NULL,
    end_page INTEGER NOT NULL,
    -- Storage key of the representative-page thumbnail; NULL until generated
    preview_path TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_parts_arrangement ON parts(arrangement_id);
CREATE INDEX IF NOT EXISTS idx_parts_start_page ON parts(arrangement_id, start_page);
"#;

//! Idempotent schema setup for the SQLite index.

use sqlx::SqlitePool;

use crate::error::StoreError;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    // One row per indexed chunk; `document_id` is denormalised out of the
    // metadata so per-document deletes can use an index.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_entries (
            id TEXT PRIMARY KEY,
            document_id TEXT,
            text TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_index_entries_document_id ON index_entries(document_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

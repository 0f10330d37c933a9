//! Idempotent schema setup.
//!
//! Creates the files table, the chunk table, and an FTS5 index over chunk
//! text. Table names come from [`DbConfig`] and have already been validated
//! as plain identifiers. Running this against an initialized database is a
//! no-op.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::DbConfig;

pub async fn run_migrations(pool: &SqlitePool, db: &DbConfig) -> Result<()> {
    let files = &db.files_table;
    let chunks = &db.chunks_table;
    let fts = db.fts_table();

    // `chunk_ids` is a JSON array of chunk ids in load order
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {files} (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL UNIQUE,
            chunk_ids TEXT NOT NULL DEFAULT '[]'
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {chunks} (
            id TEXT PRIMARY KEY,
            file_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            UNIQUE(file_id, position),
            FOREIGN KEY (file_id) REFERENCES {files}(id) ON DELETE CASCADE
        )
        "#
    ))
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?",
    )
    .bind(&fts)
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(&format!(
            r#"
            CREATE VIRTUAL TABLE {fts} USING fts5(
                chunk_id UNINDEXED,
                text
            )
            "#
        ))
        .execute(pool)
        .await?;
    }

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{chunks}_file_id ON {chunks}(file_id)"
    ))
    .execute(pool)
    .await?;

    Ok(())
}

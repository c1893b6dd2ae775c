use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    Ok(())
}

/// Apply the schema to an open pool. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Append-only copy of extracted source rows
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_messages (
            id INTEGER PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            sender_id TEXT,
            is_from_self INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            raw_text TEXT,
            is_attachment INTEGER NOT NULL DEFAULT 0,
            is_system INTEGER NOT NULL DEFAULT 0,
            is_reaction INTEGER NOT NULL DEFAULT 0,
            staged_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Messages that survived filtering/normalization
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cleaned_messages (
            id INTEGER PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            sender_id TEXT,
            is_from_self INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            text TEXT NOT NULL,
            cleaned_at INTEGER NOT NULL,
            FOREIGN KEY (id) REFERENCES raw_messages(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One cursor per pipeline stage (extract, clean) so the stages can run
    // at independent cadences
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS watermarks (
            stage TEXT PRIMARY KEY,
            cursor INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_raw_conversation ON raw_messages(conversation_id, timestamp)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_cleaned_conversation ON cleaned_messages(conversation_id, timestamp)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

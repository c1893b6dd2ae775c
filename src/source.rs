//! Source store reader.
//!
//! Opens a read-only snapshot of the live message store and enumerates rows
//! newer than the extraction watermark. The live store may be under concurrent
//! writes by the messaging client, so every read works on a file copy taken
//! into a temporary directory first.
//!
//! The reader is side-effect free and restartable: invoking it twice with the
//! same watermark yields the same rows, modulo new arrivals.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Row;

use crate::config::SourceConfig;
use crate::error::PipelineError;
use crate::models::{RawMessage, Watermark};

/// Columns the source store must expose on its `messages` table.
const REQUIRED_COLUMNS: &[&str] = &[
    "id",
    "conversation_id",
    "sender_id",
    "is_from_self",
    "timestamp",
    "text",
    "is_attachment",
    "is_system",
    "is_reaction",
];

/// Result of one bounded read pass.
pub struct ReadOutcome {
    /// New rows past the watermark, ordered by (timestamp, id) ascending.
    pub messages: Vec<RawMessage>,
    /// Rows dropped for non-fatal anomalies (non-positive timestamps).
    pub anomalies: u64,
    /// Highest source id seen this pass, dropped rows included, so the
    /// watermark can move past anomalies instead of refetching them forever.
    pub max_id_seen: Option<i64>,
}

/// Read all source rows with `id > since`, from a snapshot copy of the store.
pub async fn read_new(config: &SourceConfig, since: Watermark) -> Result<ReadOutcome> {
    let path = &config.path;
    if !path.exists() {
        return Err(PipelineError::SourceUnavailable {
            path: path.clone(),
            reason: "file does not exist".to_string(),
        }
        .into());
    }

    // Snapshot the live store before reading it.
    let snapshot_dir = tempfile::tempdir().map_err(|e| PipelineError::SourceUnavailable {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    let snapshot_path = snapshot_dir.path().join("source.sqlite");
    std::fs::copy(path, &snapshot_path).map_err(|e| PipelineError::SourceUnavailable {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let options = SqliteConnectOptions::new()
        .filename(&snapshot_path)
        .read_only(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    // Verify the expected shape before touching any data.
    let column_rows = sqlx::query("PRAGMA table_info(messages)")
        .fetch_all(&pool)
        .await?;
    let present: Vec<String> = column_rows
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !present.iter().any(|p| p == c))
        .collect();
    if !missing.is_empty() {
        pool.close().await;
        return Err(PipelineError::SourceSchemaMismatch {
            missing: missing.join(", "),
        }
        .into());
    }

    let rows = sqlx::query(
        r#"
        SELECT id, conversation_id, sender_id, is_from_self, timestamp, text,
               is_attachment, is_system, is_reaction
        FROM messages
        WHERE id > ?
        ORDER BY timestamp ASC, id ASC
        "#,
    )
    .bind(since.0)
    .fetch_all(&pool)
    .await?;

    let mut messages = Vec::with_capacity(rows.len());
    let mut anomalies = 0u64;
    let mut max_id_seen: Option<i64> = None;

    for row in &rows {
        let id: i64 = row.get("id");
        max_id_seen = Some(max_id_seen.map_or(id, |m: i64| m.max(id)));
        let timestamp: i64 = row.get("timestamp");
        if timestamp <= 0 {
            eprintln!("extract: dropping message {} (bad timestamp {})", id, timestamp);
            anomalies += 1;
            continue;
        }

        messages.push(RawMessage {
            id,
            conversation_id: row.get("conversation_id"),
            sender_id: row.get("sender_id"),
            is_from_self: row.get::<i64, _>("is_from_self") != 0,
            timestamp,
            raw_text: row.get("text"),
            is_attachment: row.get::<i64, _>("is_attachment") != 0,
            is_system: row.get::<i64, _>("is_system") != 0,
            is_reaction: row.get::<i64, _>("is_reaction") != 0,
        });
    }

    pool.close().await;
    Ok(ReadOutcome {
        messages,
        anomalies,
        max_id_seen,
    })
}

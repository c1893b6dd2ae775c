//! Raw staging store.
//!
//! Append-only copy of extracted source rows plus one watermark cursor per
//! pipeline stage, all in the staging SQLite file. Appending messages and
//! advancing the owning stage's watermark happen inside a single transaction:
//! a crash between the two can never leave the watermark ahead of unstaged
//! data.
//!
//! Duplicate message ids are skipped, not errors, so a terminated run is safe
//! to retry from the last committed watermark.

use anyhow::Result;
use sqlx::sqlite::SqliteQueryResult;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::error::PipelineError;
use crate::models::{CleanedMessage, RawMessage, Watermark};

/// Watermark key for the source → staging extraction stage.
pub const STAGE_EXTRACT: &str = "extract";
/// Watermark key for the staging → cleaned stage.
pub const STAGE_CLEAN: &str = "clean";

/// Counters from one append pass.
#[derive(Debug)]
pub struct AppendOutcome {
    pub inserted: u64,
    pub duplicates: u64,
}

pub async fn get_watermark(pool: &SqlitePool, stage: &str) -> Result<Watermark> {
    let cursor: Option<i64> = sqlx::query_scalar("SELECT cursor FROM watermarks WHERE stage = ?")
        .bind(stage)
        .fetch_optional(pool)
        .await?;
    Ok(cursor.map(Watermark).unwrap_or(Watermark::ZERO))
}

/// Stage raw messages and advance the extract watermark as one unit.
///
/// Fails with [`PipelineError::WatermarkRegression`] if `new_watermark` is
/// behind the committed cursor; nothing is written in that case.
pub async fn append_and_advance(
    pool: &SqlitePool,
    messages: &[RawMessage],
    new_watermark: Watermark,
) -> Result<AppendOutcome> {
    let mut tx = pool.begin().await?;

    advance_watermark(&mut tx, STAGE_EXTRACT, new_watermark).await?;

    let staged_at = chrono::Utc::now().timestamp();
    let mut inserted = 0u64;
    let mut duplicates = 0u64;

    for msg in messages {
        let result: SqliteQueryResult = sqlx::query(
            r#"
            INSERT INTO raw_messages
                (id, conversation_id, sender_id, is_from_self, timestamp,
                 raw_text, is_attachment, is_system, is_reaction, staged_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(msg.id)
        .bind(&msg.conversation_id)
        .bind(&msg.sender_id)
        .bind(msg.is_from_self)
        .bind(msg.timestamp)
        .bind(&msg.raw_text)
        .bind(msg.is_attachment)
        .bind(msg.is_system)
        .bind(msg.is_reaction)
        .bind(staged_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        } else {
            duplicates += 1;
        }
    }

    tx.commit().await?;
    Ok(AppendOutcome {
        inserted,
        duplicates,
    })
}

/// Raw rows past the clean watermark, ordered for the cleaning stage.
pub async fn unprocessed_raw(pool: &SqlitePool, after: Watermark) -> Result<Vec<RawMessage>> {
    let rows = sqlx::query(
        r#"
        SELECT id, conversation_id, sender_id, is_from_self, timestamp,
               raw_text, is_attachment, is_system, is_reaction
        FROM raw_messages
        WHERE id > ?
        ORDER BY conversation_id ASC, timestamp ASC, id ASC
        "#,
    )
    .bind(after.0)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| RawMessage {
            id: row.get("id"),
            conversation_id: row.get("conversation_id"),
            sender_id: row.get("sender_id"),
            is_from_self: row.get::<i64, _>("is_from_self") != 0,
            timestamp: row.get("timestamp"),
            raw_text: row.get("raw_text"),
            is_attachment: row.get::<i64, _>("is_attachment") != 0,
            is_system: row.get::<i64, _>("is_system") != 0,
            is_reaction: row.get::<i64, _>("is_reaction") != 0,
        })
        .collect())
}

/// Persist cleaned messages and advance the clean watermark as one unit.
///
/// The cursor moves to the highest raw id scanned, not the highest id kept,
/// so filtered messages are never revisited.
pub async fn store_cleaned_and_advance(
    pool: &SqlitePool,
    cleaned: &[CleanedMessage],
    new_watermark: Watermark,
) -> Result<u64> {
    let mut tx = pool.begin().await?;

    advance_watermark(&mut tx, STAGE_CLEAN, new_watermark).await?;

    let cleaned_at = chrono::Utc::now().timestamp();
    let mut inserted = 0u64;

    for msg in cleaned {
        let result = sqlx::query(
            r#"
            INSERT INTO cleaned_messages
                (id, conversation_id, sender_id, is_from_self, timestamp, text, cleaned_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(msg.id)
        .bind(&msg.conversation_id)
        .bind(&msg.sender_id)
        .bind(msg.is_from_self)
        .bind(msg.timestamp)
        .bind(&msg.text)
        .bind(cleaned_at)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

/// All cleaned messages, ordered for segmentation.
pub async fn load_cleaned(pool: &SqlitePool) -> Result<Vec<CleanedMessage>> {
    let rows = sqlx::query(
        r#"
        SELECT id, conversation_id, sender_id, is_from_self, timestamp, text
        FROM cleaned_messages
        ORDER BY conversation_id ASC, timestamp ASC, id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| CleanedMessage {
            id: row.get("id"),
            conversation_id: row.get("conversation_id"),
            sender_id: row.get("sender_id"),
            is_from_self: row.get::<i64, _>("is_from_self") != 0,
            timestamp: row.get("timestamp"),
            text: row.get("text"),
        })
        .collect())
}

/// Upsert a stage cursor inside the caller's transaction, rejecting any move
/// backwards. Equal values are a no-op refresh.
async fn advance_watermark(
    tx: &mut Transaction<'_, Sqlite>,
    stage: &str,
    new_watermark: Watermark,
) -> Result<()> {
    let current: Option<i64> = sqlx::query_scalar("SELECT cursor FROM watermarks WHERE stage = ?")
        .bind(stage)
        .fetch_optional(&mut **tx)
        .await?;

    if let Some(current) = current {
        if new_watermark.0 < current {
            return Err(PipelineError::WatermarkRegression {
                stage: stage.to_string(),
                current,
                proposed: new_watermark.0,
            }
            .into());
        }
    }

    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO watermarks (stage, cursor, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(stage) DO UPDATE SET cursor = excluded.cursor, updated_at = excluded.updated_at
        "#,
    )
    .bind(stage)
    .bind(new_watermark.0)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

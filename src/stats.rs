//! Pipeline statistics and health overview.
//!
//! Quick summary of what each stage has processed: staged and cleaned message
//! counts, per-stage watermarks, and the published snapshots. Used by
//! `distill stats` to give confidence that incremental runs are keeping up.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let raw_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM raw_messages")
        .fetch_one(&pool)
        .await?;
    let cleaned_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cleaned_messages")
        .fetch_one(&pool)
        .await?;
    let conversation_count: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT conversation_id) FROM cleaned_messages")
            .fetch_one(&pool)
            .await?;

    let watermark_rows = sqlx::query("SELECT stage, cursor, updated_at FROM watermarks ORDER BY stage")
        .fetch_all(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.staging.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("chat-distill — Pipeline Stats");
    println!("=============================");
    println!();
    println!("  Staging db:     {}", config.staging.path.display());
    println!("  Size:           {}", format_bytes(db_size));
    println!();
    println!("  Raw messages:     {}", raw_count);
    println!("  Cleaned messages: {}", cleaned_count);
    println!("  Conversations:    {}", conversation_count);
    println!();

    if watermark_rows.is_empty() {
        println!("  Watermarks:     none (no runs yet)");
    } else {
        println!("  {:<10} {:>12}  LAST RUN", "STAGE", "WATERMARK");
        for row in &watermark_rows {
            let stage: String = row.get("stage");
            let cursor: i64 = row.get("cursor");
            let updated_at: i64 = row.get("updated_at");
            let when = chrono::DateTime::from_timestamp(updated_at, 0)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| updated_at.to_string());
            println!("  {:<10} {:>12}  {}", stage, cursor, when);
        }
    }
    println!();

    let snapshots = list_snapshots(config);
    if snapshots.is_empty() {
        println!("  Snapshots:      none");
    } else {
        println!("  Snapshots ({}):", snapshots.len());
        for name in &snapshots {
            println!("    {}", name);
        }
    }

    pool.close().await;
    Ok(())
}

fn list_snapshots(config: &Config) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(&config.dataset.output_dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().is_dir())
                .map(|entry| entry.file_name().to_string_lossy().to_string())
                .filter(|name| !name.starts_with('.'))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

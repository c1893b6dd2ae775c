//! Extraction run: source store → raw staging store.
//!
//! One bounded read pass per invocation. Staging the fetched rows and
//! advancing the extract watermark commit as a single transaction, so a crash
//! mid-run never leaves the watermark ahead of unstaged data and a rerun picks
//! up exactly where the last committed run ended.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::models::Watermark;
use crate::source;
use crate::staging;

pub async fn run_extract(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let watermark = staging::get_watermark(&pool, staging::STAGE_EXTRACT).await?;
    let outcome = source::read_new(&config.source, watermark).await?;

    let new_watermark = outcome
        .max_id_seen
        .map(Watermark)
        .unwrap_or(watermark)
        .max(watermark);

    println!("extract");
    println!("  watermark: {}", watermark);
    println!("  fetched: {} messages", outcome.messages.len());

    if outcome.messages.is_empty() && new_watermark == watermark {
        // Nothing new: leave the store byte-identical.
        println!("  staged: 0");
        println!("  new watermark: {}", watermark);
        println!("ok");
        pool.close().await;
        return Ok(());
    }

    let append = staging::append_and_advance(&pool, &outcome.messages, new_watermark).await?;

    println!("  staged: {}", append.inserted);
    if append.duplicates > 0 {
        println!("  duplicates skipped: {}", append.duplicates);
    }
    if outcome.anomalies > 0 {
        println!("  anomalies dropped: {}", outcome.anomalies);
    }
    println!("  new watermark: {}", new_watermark);
    println!("ok");

    pool.close().await;
    Ok(())
}

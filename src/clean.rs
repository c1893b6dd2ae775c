//! Cleaning run: raw staging store → cleaned message store.
//!
//! Runs at its own cadence behind an independent watermark, so extraction and
//! cleaning never have to happen together. Filtered rows still advance the
//! cursor — they are dropped for good, not revisited.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::models::Watermark;
use crate::normalize::normalize;
use crate::staging;

pub async fn run_clean(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let watermark = staging::get_watermark(&pool, staging::STAGE_CLEAN).await?;
    let raws = staging::unprocessed_raw(&pool, watermark).await?;

    println!("clean");
    println!("  watermark: {}", watermark);
    println!("  scanned: {} messages", raws.len());

    if raws.is_empty() {
        println!("  cleaned: 0");
        println!("  new watermark: {}", watermark);
        println!("ok");
        pool.close().await;
        return Ok(());
    }

    let mut cleaned = Vec::with_capacity(raws.len());
    let mut filtered = 0u64;
    for raw in &raws {
        match normalize(raw) {
            Some(msg) => cleaned.push(msg),
            None => filtered += 1,
        }
    }

    let new_watermark = Watermark(
        raws.iter()
            .map(|m| m.id)
            .max()
            .unwrap_or(watermark.0),
    );
    let inserted = staging::store_cleaned_and_advance(&pool, &cleaned, new_watermark).await?;

    println!("  cleaned: {}", inserted);
    println!("  filtered: {}", filtered);
    println!("  new watermark: {}", new_watermark);
    println!("ok");

    pool.close().await;
    Ok(())
}

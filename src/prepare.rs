//! Dataset snapshot assembly and atomic publish.
//!
//! Loads the cleaned message store, segments it into conversation units,
//! builds the partitioned example sets, and publishes one immutable snapshot
//! directory per run: `train.jsonl`, `validation.jsonl`, and `metadata.json`
//! written into a temp directory and made visible with a single rename.
//! Previously published snapshots are never touched.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::Config;
use crate::dataset::{self, BuildOptions, Example, ExampleFormat, GroupRoles};
use crate::db;
use crate::segment;
use crate::staging;

/// Snapshot descriptor written next to the example files.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotMetadata {
    pub created_at: String,
    pub source_watermark: i64,
    pub split_ratio: f64,
    pub seed: u64,
    pub gap_threshold_secs: i64,
    pub format: String,
    pub group_roles: String,
    pub conversation_units: usize,
    pub train_examples: usize,
    pub validation_examples: usize,
}

pub async fn run_prepare(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let source_watermark = staging::get_watermark(&pool, staging::STAGE_EXTRACT).await?;
    let cleaned = staging::load_cleaned(&pool).await?;
    pool.close().await;

    let cleaned_count = cleaned.len();
    let conversations = segment::segment(cleaned, config.segmentation.gap_threshold_secs);

    let opts = BuildOptions {
        format: ExampleFormat::parse(&config.dataset.format)
            .ok_or_else(|| anyhow!("Unknown dataset.format: {}", config.dataset.format))?,
        group_roles: GroupRoles::parse(&config.segmentation.group_roles).ok_or_else(|| {
            anyhow!(
                "Unknown segmentation.group_roles: {}",
                config.segmentation.group_roles
            )
        })?,
        system_prompt: config.dataset.system_prompt.clone(),
        split_ratio: config.dataset.split_ratio,
        seed: config.dataset.seed,
        allow_empty_context: config.dataset.allow_empty_context,
        min_messages: config.dataset.min_messages,
    };

    let split = dataset::build(&conversations, &opts)?;

    let metadata = SnapshotMetadata {
        created_at: chrono::Utc::now().to_rfc3339(),
        source_watermark: source_watermark.0,
        split_ratio: opts.split_ratio,
        seed: opts.seed,
        gap_threshold_secs: config.segmentation.gap_threshold_secs,
        format: opts.format.as_str().to_string(),
        group_roles: opts.group_roles.as_str().to_string(),
        conversation_units: split.units_used,
        train_examples: split.train.len(),
        validation_examples: split.validation.len(),
    };

    let snapshot_dir = write_snapshot(
        &config.dataset.output_dir,
        &split.train,
        &split.validation,
        &metadata,
        source_watermark.0,
    )?;

    println!("prepare");
    println!("  cleaned messages: {}", cleaned_count);
    println!("  conversation units: {}", conversations.len());
    println!("  train examples: {}", split.train.len());
    println!("  validation examples: {}", split.validation.len());
    println!("  snapshot: {}", snapshot_dir.display());
    println!("ok");

    Ok(())
}

/// Write all snapshot files into a temp directory inside `output_dir`, then
/// publish with one rename. A crash mid-write leaves only an invisible
/// `.tmp-*` directory behind.
fn write_snapshot(
    output_dir: &Path,
    train: &[Example],
    validation: &[Example],
    metadata: &SnapshotMetadata,
    watermark: i64,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let tmp = output_dir.join(format!(".tmp-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&tmp)?;

    write_jsonl(&tmp.join("train.jsonl"), train)?;
    write_jsonl(&tmp.join("validation.jsonl"), validation)?;
    std::fs::write(
        tmp.join("metadata.json"),
        serde_json::to_string_pretty(metadata)?,
    )?;

    let version = format!(
        "{}-w{}",
        chrono::Utc::now().format("%Y%m%dT%H%M%SZ"),
        watermark
    );
    let mut dest = output_dir.join(&version);
    let mut attempt = 1;
    while dest.exists() {
        attempt += 1;
        dest = output_dir.join(format!("{}-{}", version, attempt));
    }

    std::fs::rename(&tmp, &dest)?;
    Ok(dest)
}

/// One example per line, stable bytes for stable inputs.
fn write_jsonl(path: &Path, examples: &[Example]) -> Result<()> {
    let mut out = String::new();
    for example in examples {
        out.push_str(&serde_json::to_string(example)?);
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}

//! Pipeline error taxonomy.
//!
//! Fatal errors that stop a run are typed so callers can match on them;
//! everything else flows through `anyhow` at the command layer. Per-message
//! anomalies (unparseable bodies, bad timestamps) are not errors — they are
//! dropped and counted by the stage that sees them.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source store path is missing or cannot be read. Nothing was staged.
    #[error("source store unavailable at {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    /// The source store exists but lacks required columns. Nothing was staged.
    #[error("source store schema mismatch: missing columns [{missing}]")]
    SourceSchemaMismatch { missing: String },

    /// A stage tried to move its watermark backwards. Indicates state
    /// corruption or a concurrent run; surfaced, never auto-corrected.
    #[error("watermark regression for stage '{stage}': current {current}, proposed {proposed}")]
    WatermarkRegression {
        stage: String,
        current: i64,
        proposed: i64,
    },

    /// `dataset.split_ratio` outside the open interval (0, 1).
    #[error("dataset.split_ratio must be in (0, 1), got {0}")]
    InvalidSplitRatio(f64),

    /// `segmentation.gap_threshold_secs` must be positive.
    #[error("segmentation.gap_threshold_secs must be positive, got {0}")]
    InvalidGapThreshold(i64),
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub staging: StagingConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub fine_tuning: FineTuningConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Path to the live message store (a SQLite file). A snapshot copy is
    /// taken before every read.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StagingConfig {
    /// Path of the staging SQLite file (raw + cleaned messages + watermarks).
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmentationConfig {
    /// Gap between consecutive messages (seconds) that starts a new
    /// conversation unit.
    #[serde(default = "default_gap_threshold")]
    pub gap_threshold_secs: i64,

    /// Role tagging for group conversations: `collapsed` maps every non-self
    /// participant to one `user` role; `individual` also records the sender id
    /// on each turn.
    #[serde(default = "default_group_roles")]
    pub group_roles: String,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            gap_threshold_secs: default_gap_threshold(),
            group_roles: default_group_roles(),
        }
    }
}

fn default_gap_threshold() -> i64 {
    3600
}
fn default_group_roles() -> String {
    "collapsed".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    /// Directory that receives one immutable snapshot subdirectory per run.
    pub output_dir: PathBuf,

    /// Fraction of conversations assigned to the training set, in (0, 1).
    #[serde(default = "default_split_ratio")]
    pub split_ratio: f64,

    /// Seed for the deterministic train/validation partition.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Example shape: `conversation` (full role-tagged turn sequence) or
    /// `pairs` (context/response records).
    #[serde(default = "default_format")]
    pub format: String,

    /// Optional system prompt prepended to every example.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Emit pair examples whose context window is empty (consecutive
    /// self-authored turns). Off by default.
    #[serde(default)]
    pub allow_empty_context: bool,

    /// Conversation units with fewer messages than this are skipped.
    #[serde(default = "default_min_messages")]
    pub min_messages: usize,
}

fn default_split_ratio() -> f64 {
    0.9
}
fn default_seed() -> u64 {
    42
}
fn default_format() -> String {
    "conversation".to_string()
}
fn default_min_messages() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct FineTuningConfig {
    /// `disabled` or `openai`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Base model to fine-tune (e.g. `gpt-4o-mini-2024-07-18`).
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Optional epoch count forwarded as a job hyperparameter.
    #[serde(default)]
    pub n_epochs: Option<u32>,
}

impl Default for FineTuningConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            n_epochs: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}

impl FineTuningConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Load and validate the configuration. Configuration errors are fatal here,
/// before any store is opened.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.segmentation.gap_threshold_secs <= 0 {
        return Err(PipelineError::InvalidGapThreshold(config.segmentation.gap_threshold_secs).into());
    }

    if !(config.dataset.split_ratio > 0.0 && config.dataset.split_ratio < 1.0) {
        return Err(PipelineError::InvalidSplitRatio(config.dataset.split_ratio).into());
    }

    match config.segmentation.group_roles.as_str() {
        "collapsed" | "individual" => {}
        other => anyhow::bail!(
            "Unknown segmentation.group_roles: '{}'. Must be collapsed or individual.",
            other
        ),
    }

    match config.dataset.format.as_str() {
        "conversation" | "pairs" => {}
        other => anyhow::bail!(
            "Unknown dataset.format: '{}'. Must be conversation or pairs.",
            other
        ),
    }

    match config.fine_tuning.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown fine_tuning.provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.fine_tuning.is_enabled() && config.fine_tuning.model.is_none() {
        anyhow::bail!(
            "fine_tuning.model must be specified when provider is '{}'",
            config.fine_tuning.provider
        );
    }

    Ok(config)
}

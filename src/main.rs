//! # chat-distill CLI (`distill`)
//!
//! The `distill` binary drives the pipeline end to end: staging database
//! initialization, incremental extraction, cleaning, dataset snapshot
//! preparation, and fine-tuning submission.
//!
//! ## Usage
//!
//! ```bash
//! distill --config ./config/distill.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `distill init` | Create the staging SQLite database and run schema migrations |
//! | `distill extract` | Stage new source messages past the extract watermark |
//! | `distill clean` | Filter and normalize staged messages past the clean watermark |
//! | `distill prepare` | Segment conversations and publish a dataset snapshot |
//! | `distill submit` | Submit a snapshot to the fine-tuning provider |
//! | `distill stats` | Show staging counts, watermarks, and snapshots |
//! | `distill reset` | Delete the staging database (snapshots are kept) |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chat_distill::{clean, config, extract, migrate, prepare, reset, stats, tuner};

/// chat-distill — distill personal message history into fine-tuning datasets.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/distill.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "distill",
    about = "chat-distill — distill personal message history into fine-tuning datasets",
    version,
    long_about = "chat-distill incrementally extracts messages from a local message store, \
    cleans and groups them into conversations, and publishes immutable train/validation \
    dataset snapshots for supervised fine-tuning."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/distill.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the staging database schema.
    ///
    /// Creates the SQLite file and all required tables (raw_messages,
    /// cleaned_messages, watermarks). Idempotent — running it multiple
    /// times is safe.
    Init,

    /// Stage new messages from the source store.
    ///
    /// Takes a snapshot copy of the live store, reads rows past the extract
    /// watermark, and commits them together with the new watermark as one
    /// transaction. Re-running with no new source data changes nothing.
    Extract,

    /// Filter and normalize staged messages.
    ///
    /// Drops reactions, system messages, and bare attachment placeholders;
    /// repairs encoded bodies and collapses whitespace. Runs behind its own
    /// watermark so cleaning can lag extraction.
    Clean,

    /// Build and publish a dataset snapshot.
    ///
    /// Segments cleaned messages into conversation units, builds examples in
    /// the configured format, partitions them deterministically into train
    /// and validation sets, and publishes an immutable snapshot directory.
    Prepare,

    /// Submit a snapshot to the fine-tuning provider.
    ///
    /// Uploads the snapshot's train/validation files and creates a
    /// fine-tuning job, printing the provider's job handle. Job status is
    /// not polled here.
    Submit {
        /// Snapshot directory to submit. Defaults to the newest one.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Show staging counts, watermarks, and published snapshots.
    Stats,

    /// Delete the staging database so the pipeline restarts from scratch.
    ///
    /// Published snapshots are immutable and are never removed.
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Staging database initialized successfully.");
        }
        Commands::Extract => {
            extract::run_extract(&cfg).await?;
        }
        Commands::Clean => {
            clean::run_clean(&cfg).await?;
        }
        Commands::Prepare => {
            prepare::run_prepare(&cfg).await?;
        }
        Commands::Submit { snapshot } => {
            tuner::run_submit(&cfg, snapshot).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Reset => {
            reset::run_reset(&cfg)?;
        }
    }

    Ok(())
}

//! # chat-distill
//!
//! A local-first pipeline that distills personal message history into
//! supervised fine-tuning datasets.
//!
//! chat-distill incrementally extracts message rows from a snapshot of a local
//! message store, filters and normalizes them, groups them into conversation
//! units, and writes immutable train/validation dataset snapshots ready for a
//! fine-tuning provider.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌───────────┐
//! │  Source   │──▶│ Staging  │──▶│  Cleaned  │──▶│ Snapshots │
//! │ snapshot  │   │ raw rows │   │ messages  │   │ train/val │
//! └──────────┘   └────┬─────┘   └─────┬─────┘   └─────┬─────┘
//!                     │               │               │
//!                 watermark       watermark        submit ▶ provider
//! ```
//!
//! Each stage is re-runnable; only the per-stage watermarks and the published
//! snapshot directories carry state forward. Staging and watermark advancement
//! commit as one transaction, and snapshots publish with a single rename, so a
//! crashed run is always safe to retry.
//!
//! ## Quick Start
//!
//! ```bash
//! distill init                  # create the staging database
//! distill extract               # pull new messages past the watermark
//! distill clean                 # filter and normalize staged messages
//! distill prepare               # segment + build a dataset snapshot
//! distill submit                # hand the newest snapshot to the provider
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Typed pipeline error taxonomy |
//! | [`models`] | Core data types |
//! | [`source`] | Read-only source store reader |
//! | [`staging`] | Raw staging store and watermarks |
//! | [`normalize`] | Message filtering and text normalization |
//! | [`segment`] | Conversation segmentation |
//! | [`dataset`] | Example building and train/validation split |
//! | [`prepare`] | Snapshot assembly and atomic publish |
//! | [`tuner`] | Fine-tuning submission |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod clean;
pub mod config;
pub mod dataset;
pub mod db;
pub mod error;
pub mod extract;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod prepare;
pub mod reset;
pub mod segment;
pub mod source;
pub mod staging;
pub mod stats;
pub mod tuner;

//! Staging store reset.
//!
//! Deletes the staging SQLite file (and its WAL siblings) so the pipeline can
//! restart from scratch. Published dataset snapshots are immutable artifacts
//! and are never touched.

use anyhow::Result;
use std::path::PathBuf;

use crate::config::Config;

pub fn run_reset(config: &Config) -> Result<()> {
    let path = &config.staging.path;
    let mut removed = false;

    for suffix in ["", "-wal", "-shm"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        let candidate = PathBuf::from(name);
        if candidate.exists() {
            std::fs::remove_file(&candidate)?;
            removed = true;
        }
    }

    println!("reset");
    if removed {
        println!("  removed: {}", path.display());
    } else {
        println!("  nothing to remove: {}", path.display());
    }
    println!("ok");
    Ok(())
}

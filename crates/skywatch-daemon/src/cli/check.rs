//! Load and validate the configuration, then report.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::DaemonConfig;

pub fn run(path: &Path) -> Result<()> {
    let config = DaemonConfig::load(path)?;
    config.validate().context("invalid configuration")?;

    let mut loops = Vec::new();
    if config.tile.is_some() {
        loops.push("tile");
    }
    if config.camera.is_some() {
        loops.push("camera");
    }
    println!("  config ok: {} ({})", path.display(), loops.join(", "));
    Ok(())
}

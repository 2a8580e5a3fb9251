//! Execute one acquisition cycle immediately and exit.
//!
//! Diagnostics aid: runs regardless of the active window, so an operator
//! can exercise a loop at any hour.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::ValueEnum;

use crate::cli::run::{camera_cycle, tile_cycle};
use crate::config::DaemonConfig;
use crate::events::EventBus;
use crate::scheduler::AcquisitionCycle;

/// Which loop to drive.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LoopName {
    Tile,
    Camera,
}

pub async fn run(config: DaemonConfig, target: LoopName) -> Result<()> {
    config.validate().context("invalid configuration")?;
    let events = Arc::new(EventBus::new(16));

    let path = match target {
        LoopName::Tile => {
            let cfg = config.tile.as_ref().context("no tile loop configured")?;
            let (mut cycle, _, _) = tile_cycle(cfg, events)?;
            cycle.run(Utc::now()).await?
        }
        LoopName::Camera => {
            let cfg = config.camera.as_ref().context("no camera loop configured")?;
            let (mut cycle, _, _) = camera_cycle(cfg, events)?;
            cycle.run(Utc::now()).await?
        }
    };

    println!("  stored {}", path.display());
    Ok(())
}

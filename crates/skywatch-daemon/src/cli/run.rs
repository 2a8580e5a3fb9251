//! Run every configured acquisition loop until shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use skywatch::{ActiveWindow, LatestSnapshotStore, RetentionPolicy, RollingStore};
use tokio::sync::Notify;
use tracing::info;

use crate::capture::{DeviceSettings, StillCommand};
use crate::config::{build_window, CameraLoopConfig, DaemonConfig, TileLoopConfig};
use crate::events::EventBus;
use crate::fetch::{LocatorTemplate, TileFetcher};
use crate::scheduler::{CameraCycle, Scheduler, TileCycle};

/// Build the tile cycle and its schedule parameters from config.
pub(crate) fn tile_cycle(
    cfg: &TileLoopConfig,
    events: Arc<EventBus>,
) -> Result<(TileCycle, Duration, Option<ActiveWindow>)> {
    let template = LocatorTemplate::parse(&cfg.url_template)?;
    let interval = Duration::from_secs(cfg.interval_secs);
    let fetcher = TileFetcher::new(template, Duration::from_millis(cfg.timeout_ms));
    let store = LatestSnapshotStore::new(&cfg.output_dir, &cfg.file_name);
    let window = build_window(cfg.active_window)?;
    Ok((TileCycle::new(fetcher, store, interval, events), interval, window))
}

/// Build the camera cycle and its schedule parameters from config.
pub(crate) fn camera_cycle(
    cfg: &CameraLoopConfig,
    events: Arc<EventBus>,
) -> Result<(CameraCycle, Duration, Option<ActiveWindow>)> {
    let device = Arc::new(StillCommand::new(&cfg.command));
    let settings = DeviceSettings::from(cfg.settings.clone());
    let store = RollingStore::new(&cfg.output_dir, &cfg.prefix, &cfg.extension);
    let policy = RetentionPolicy::keep(cfg.max_count).with_pin_prefix(&cfg.pin_prefix);
    let window = build_window(cfg.active_window)?;
    Ok((
        CameraCycle::new(device, settings, store, policy, events),
        Duration::from_secs(cfg.interval_secs),
        window,
    ))
}

/// Start the daemon: one independent task per configured loop, parked by
/// Ctrl-C at the next cycle boundary.
pub async fn run(config: DaemonConfig) -> Result<()> {
    config.validate().context("invalid configuration")?;

    let events = Arc::new(EventBus::new(64));
    let mut shutdowns: Vec<Arc<Notify>> = Vec::new();
    let mut handles = Vec::new();

    if let Some(tile) = &config.tile {
        let shutdown = Arc::new(Notify::new());
        shutdowns.push(Arc::clone(&shutdown));
        let (cycle, interval, window) = tile_cycle(tile, Arc::clone(&events))?;
        let sched = Scheduler::new(cycle, interval, window, Arc::clone(&events), shutdown);
        handles.push(tokio::spawn(sched.run()));
    }

    if let Some(camera) = &config.camera {
        let shutdown = Arc::new(Notify::new());
        shutdowns.push(Arc::clone(&shutdown));
        let (cycle, interval, window) = camera_cycle(camera, Arc::clone(&events))?;
        let sched = Scheduler::new(cycle, interval, window, Arc::clone(&events), shutdown);
        handles.push(tokio::spawn(sched.run()));
    }

    info!(
        "skywatchd v{} started: {} loop(s)",
        env!("CARGO_PKG_VERSION"),
        handles.len()
    );

    // One permit per loop: a loop mid-cycle still parks at its next
    // boundary.
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        for shutdown in &shutdowns {
            shutdown.notify_one();
        }
    });

    for handle in handles {
        let _ = handle.await;
    }
    info!("skywatchd stopped");
    Ok(())
}

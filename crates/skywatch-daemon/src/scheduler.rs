//! Interval-driven acquisition loops.
//!
//! One generic scheduler drives two cycle kinds: the remote tile fetch
//! (latest-snapshot store) and the local camera capture (rolling store with
//! retention). Every per-cycle failure is caught here, logged with the
//! attempted index or instant, and swallowed; the cadence never changes,
//! and a sustained upstream outage costs nothing but log lines.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use skywatch::{
    AcquisitionIndex, ActiveWindow, CaptureError, FetchError, LatestSnapshotStore,
    RetentionPolicy, RollingStore, StorageError,
};
use tokio::sync::Notify;

use crate::capture::{CaptureDevice, DeviceSettings};
use crate::events::{EventBus, SkywatchEvent};
use crate::fetch::TileFetcher;

/// Per-cycle failure, caught and logged at the scheduler boundary.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One acquisition cycle: everything between two timer ticks.
#[async_trait]
pub trait AcquisitionCycle: Send {
    fn name(&self) -> &'static str;

    /// Run one cycle at wall-clock `now`; returns the stored path.
    async fn run(&mut self, now: DateTime<Utc>) -> Result<PathBuf, CycleError>;
}

/// Remote tile fetch into a latest-snapshot store.
pub struct TileCycle {
    fetcher: TileFetcher,
    store: LatestSnapshotStore,
    interval: Duration,
    events: Arc<EventBus>,
}

impl TileCycle {
    pub fn new(
        fetcher: TileFetcher,
        store: LatestSnapshotStore,
        interval: Duration,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            fetcher,
            store,
            interval,
            events,
        }
    }
}

#[async_trait]
impl AcquisitionCycle for TileCycle {
    fn name(&self) -> &'static str {
        "tile"
    }

    async fn run(&mut self, now: DateTime<Utc>) -> Result<PathBuf, CycleError> {
        let index = AcquisitionIndex::align(now, self.interval);
        let bytes = match self.fetcher.fetch(&index).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.events.emit(SkywatchEvent::FetchFailed {
                    index: index.to_string(),
                    reason: e.to_string(),
                });
                return Err(e.into());
            }
        };
        // Only a validated, non-empty payload reaches the store.
        let path = self.store.put_latest(&bytes)?;
        tracing::info!(
            "tile {index} stored ({} bytes) at {}",
            bytes.len(),
            path.display()
        );
        self.events.emit(SkywatchEvent::SnapshotRefreshed {
            path: path.display().to_string(),
            index: index.to_string(),
        });
        Ok(path)
    }
}

/// Local camera capture into a rolling store, followed by a retention pass.
pub struct CameraCycle {
    device: Arc<dyn CaptureDevice>,
    settings: DeviceSettings,
    store: RollingStore,
    policy: RetentionPolicy,
    events: Arc<EventBus>,
}

impl CameraCycle {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        settings: DeviceSettings,
        store: RollingStore,
        policy: RetentionPolicy,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            device,
            settings,
            store,
            policy,
            events,
        }
    }
}

#[async_trait]
impl AcquisitionCycle for CameraCycle {
    fn name(&self) -> &'static str {
        "camera"
    }

    async fn run(&mut self, now: DateTime<Utc>) -> Result<PathBuf, CycleError> {
        let path = self.store.claim_path(now)?;
        if let Err(e) = self.device.capture(&path, &self.settings).await {
            self.events.emit(SkywatchEvent::CaptureFailed {
                instant: now,
                reason: e.to_string(),
            });
            return Err(e.into());
        }
        tracing::info!("frame captured at {}", path.display());
        self.events.emit(SkywatchEvent::ArtifactStored {
            path: path.display().to_string(),
            captured_at: now,
        });

        // Eviction failure is non-fatal: the pass after the next successful
        // capture retries.
        match self.store.enforce(&self.policy) {
            Ok(report) if !report.evicted.is_empty() => {
                tracing::info!(
                    "retention evicted {} frame(s), kept {} + {} pinned",
                    report.evicted.len(),
                    report.kept,
                    report.pinned
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("retention pass failed: {e}"),
        }

        Ok(path)
    }
}

/// Drives one cycle per tick until shutdown is signaled.
///
/// The loop has no terminal state of its own; it parks only when the
/// shutdown handle fires, always at a cycle boundary. Stopping mid-fetch
/// abandons the in-flight call, which is safe because nothing is written
/// until a full validated payload is in hand.
pub struct Scheduler<C: AcquisitionCycle> {
    cycle: C,
    interval: Duration,
    window: Option<ActiveWindow>,
    events: Arc<EventBus>,
    shutdown: Arc<Notify>,
}

impl<C: AcquisitionCycle> Scheduler<C> {
    pub fn new(
        cycle: C,
        interval: Duration,
        window: Option<ActiveWindow>,
        events: Arc<EventBus>,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            cycle,
            interval,
            window,
            events,
            shutdown,
        }
    }

    /// Run the loop until shutdown.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            "{} loop started: every {}s{}",
            self.cycle.name(),
            self.interval.as_secs(),
            match &self.window {
                Some(w) => format!(", active [{}, {}) UTC", w.start_hour(), w.end_hour()),
                None => String::new(),
            }
        );

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    tracing::info!("{} loop stopping", self.cycle.name());
                    break;
                }
                _ = ticker.tick() => {
                    self.tick(Utc::now()).await;
                }
            }
        }
    }

    /// One wake-up: gate check, then at most one cycle. A closed window
    /// still consumes a full tick so the schedule never drifts.
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        if let Some(window) = &self.window {
            if !window.is_open(now) {
                tracing::debug!(
                    "{} cycle skipped: hour {} outside [{}, {})",
                    self.cycle.name(),
                    now.hour(),
                    window.start_hour(),
                    window.end_hour()
                );
                self.events.emit(SkywatchEvent::CycleSkipped {
                    loop_name: self.cycle.name().to_string(),
                    hour: now.hour(),
                });
                return;
            }
        }

        match self.cycle.run(now).await {
            Ok(path) => {
                tracing::debug!("{} cycle complete: {}", self.cycle.name(), path.display())
            }
            Err(e) => tracing::warn!(
                "{} cycle failed at {}: {e}",
                self.cycle.name(),
                now.format("%Y-%m-%dT%H:%M:%SZ")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCycle {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl AcquisitionCycle for CountingCycle {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&mut self, _now: DateTime<Utc>) -> Result<PathBuf, CycleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CycleError::Fetch(FetchError::NotYetPublished))
            } else {
                Ok(PathBuf::from("/tmp/artifact"))
            }
        }
    }

    fn scheduler(
        fail: bool,
        window: Option<ActiveWindow>,
        shutdown: Arc<Notify>,
    ) -> (Scheduler<CountingCycle>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let cycle = CountingCycle {
            calls: Arc::clone(&calls),
            fail,
        };
        let events = Arc::new(EventBus::new(16));
        (
            Scheduler::new(cycle, Duration::from_millis(10), window, events, shutdown),
            calls,
        )
    }

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn test_tick_runs_cycle_when_open() {
        let (mut sched, calls) = scheduler(false, None, Arc::new(Notify::new()));
        sched.tick(at_hour(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tick_skips_outside_window_but_still_wakes() {
        let window = ActiveWindow::new(3, 18).unwrap();
        let (mut sched, calls) = scheduler(false, Some(window), Arc::new(Notify::new()));
        let mut rx = sched.events.subscribe();

        sched.tick(at_hour(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            rx.try_recv().unwrap(),
            SkywatchEvent::CycleSkipped { hour: 2, .. }
        ));

        sched.tick(at_hour(3)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_loop() {
        let (mut sched, calls) = scheduler(true, None, Arc::new(Notify::new()));
        sched.tick(at_hour(10)).await;
        sched.tick(at_hour(11)).await;
        sched.tick(at_hour(12)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_parks_on_shutdown() {
        let shutdown = Arc::new(Notify::new());
        let (sched, calls) = scheduler(false, None, Arc::clone(&shutdown));

        let handle = tokio::spawn(sched.run());
        tokio::time::sleep(Duration::from_millis(35)).await;
        shutdown.notify_one();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop did not park after shutdown")
            .unwrap();
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }
}

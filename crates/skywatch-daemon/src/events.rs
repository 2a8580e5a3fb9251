//! Daemon event bus — typed events from the acquisition loops.
//!
//! A `tokio::sync::broadcast` channel carrying [`SkywatchEvent`]. External
//! collaborators (a notification pusher, an offline-cache warmer) subscribe
//! independently; with no subscribers events are silently dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Every event the daemon emits. Serialized to JSON for outbound consumers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SkywatchEvent {
    /// A rolling artifact was stored and is available to collaborators.
    ArtifactStored {
        path: String,
        captured_at: DateTime<Utc>,
    },
    /// The latest-snapshot file was atomically replaced.
    SnapshotRefreshed { path: String, index: String },
    /// A cycle woke outside the active window and did nothing.
    CycleSkipped { loop_name: String, hour: u32 },
    /// A tile fetch failed; the next cycle retries on schedule.
    FetchFailed { index: String, reason: String },
    /// A camera capture failed.
    CaptureFailed {
        instant: DateTime<Utc>,
        reason: String,
    },
}

/// The central event bus for the daemon.
pub struct EventBus {
    sender: broadcast::Sender<SkywatchEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: SkywatchEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<SkywatchEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = SkywatchEvent::ArtifactStored {
            path: "/var/skywatch/sky/sky_20240601_100733.jpg".to_string(),
            captured_at: Utc.with_ymd_and_hms(2024, 6, 1, 10, 7, 33).unwrap(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("ArtifactStored"));
        assert!(json.contains("sky_20240601_100733.jpg"));

        let parsed: SkywatchEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            SkywatchEvent::ArtifactStored { path, .. } => {
                assert!(path.ends_with("sky_20240601_100733.jpg"))
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.emit(SkywatchEvent::CycleSkipped {
            loop_name: "camera".to_string(),
            hour: 2,
        });
    }

    #[test]
    fn test_subscribe_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(SkywatchEvent::SnapshotRefreshed {
            path: "/var/skywatch/tiles/latest.png".to_string(),
            index: "202406011000".to_string(),
        });

        let event = rx.try_recv().unwrap();
        match event {
            SkywatchEvent::SnapshotRefreshed { index, .. } => assert_eq!(index, "202406011000"),
            _ => panic!("wrong event"),
        }
    }
}

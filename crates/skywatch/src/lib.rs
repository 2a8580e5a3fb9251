//! Skywatch core — scheduled acquisition & retention primitives.
//!
//! Pure building blocks shared by the daemon: wall-clock alignment to an
//! upstream publication grid, time-of-day gating, and bounded artifact
//! stores. Nothing here touches the network or an async runtime.

pub mod align;
pub mod gate;
pub mod retention;
pub mod store;
pub mod types;

pub use align::AcquisitionIndex;
pub use gate::ActiveWindow;
pub use retention::{EvictionReport, PinPredicate, RetentionPolicy};
pub use store::{ArtifactEntry, LatestSnapshotStore, RollingStore};
pub use types::{CaptureError, ConfigError, FetchError, StorageError};

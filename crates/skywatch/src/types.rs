//! Shared error taxonomy for acquisition, capture, and storage.

use thiserror::Error;

/// Errors from one tile-fetch attempt.
///
/// There is no in-process retry: every variant is recovered by the next
/// scheduled cycle.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport/DNS/connect failure, or a non-2xx response.
    #[error("upstream unavailable: {reason}")]
    Unavailable {
        /// HTTP status, when a response was received at all.
        status: Option<u16>,
        reason: String,
    },

    /// Upstream answered with an empty payload: the artifact for this index
    /// has not materialized yet (clock/publication skew). Must never be
    /// written to storage.
    #[error("artifact not yet published upstream")]
    NotYetPublished,

    /// The request exceeded its deadline.
    #[error("fetch timed out")]
    Timeout,
}

/// Errors from the capture device.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture device busy")]
    DeviceBusy,

    #[error("capture device error: {0}")]
    DeviceError(String),
}

/// Errors from the artifact stores.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("write failed: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// A retention pass could not run. Non-fatal: the pass after the next
    /// successful capture retries.
    #[error("eviction failed: {0}")]
    EvictionFailed(String),
}

/// Configuration problems detected at startup. The only fatal error class:
/// these surface before any loop starts, never mid-run.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("acquisition interval must be positive")]
    NonPositiveInterval,

    #[error("invalid active window [{start}, {end}): need start < end, start <= 23, end <= 24")]
    InvalidWindow { start: u32, end: u32 },

    #[error("malformed locator template: {0}")]
    MalformedTemplate(String),

    #[error("retention max_count must be positive")]
    ZeroRetention,

    #[error("capture command must not be empty")]
    EmptyCommand,

    #[error("no acquisition loop configured")]
    NothingConfigured,
}

//! Time-of-day gating for acquisition loops.

use chrono::{DateTime, Timelike, Utc};

use crate::types::ConfigError;

/// Half-open `[start, end)` window of whole UTC hours during which
/// acquisition is permitted (e.g. the sky camera only runs in daylight).
///
/// Whole-hour granularity; minutes are ignored. A loop with no window is
/// always open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWindow {
    start_hour: u32,
    end_hour: u32,
}

impl ActiveWindow {
    /// Build a window, rejecting impossible bounds up front.
    pub fn new(start_hour: u32, end_hour: u32) -> Result<Self, ConfigError> {
        if start_hour > 23 || end_hour > 24 || start_hour >= end_hour {
            return Err(ConfigError::InvalidWindow {
                start: start_hour,
                end: end_hour,
            });
        }
        Ok(Self {
            start_hour,
            end_hour,
        })
    }

    /// Whether acquisition is permitted at `now`. Depends only on the UTC
    /// hour: inclusive at the start bound, exclusive at the end.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let hour = now.hour();
        self.start_hour <= hour && hour < self.end_hour
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }
}

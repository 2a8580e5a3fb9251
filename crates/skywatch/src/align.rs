//! Wall-clock alignment to the upstream publication grid.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

/// Canonical index of one upstream publication instant.
///
/// Derived purely from the clock reading and the configured interval; never
/// persisted on its own. Displays as fixed-width `YYYYMMDDHHMM`, and exposes
/// zero-padded components for locator interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AcquisitionIndex(DateTime<Utc>);

impl AcquisitionIndex {
    /// Floor `now` to the most recent multiple of `interval`.
    ///
    /// Flooring runs over the full epoch timeline, not the minute-of-hour,
    /// so intervals that do not divide one hour evenly (or exceed it) still
    /// land on a stable grid. Pure function; a monotonic clock yields a
    /// monotonically non-decreasing index.
    pub fn align(now: DateTime<Utc>, interval: Duration) -> Self {
        let step = interval.as_secs().max(1) as i64;
        let floored = now.timestamp() - now.timestamp().rem_euclid(step);
        Self(Utc.timestamp_opt(floored, 0).single().unwrap_or(now))
    }

    /// The publication instant this index addresses.
    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn year(&self) -> String {
        format!("{:04}", self.0.year())
    }

    pub fn month(&self) -> String {
        format!("{:02}", self.0.month())
    }

    pub fn day(&self) -> String {
        format!("{:02}", self.0.day())
    }

    pub fn hour(&self) -> String {
        format!("{:02}", self.0.hour())
    }

    pub fn minute(&self) -> String {
        format!("{:02}", self.0.minute())
    }
}

impl fmt::Display for AcquisitionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d%H%M"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_align_floors_to_quarter_hour() {
        let index = AcquisitionIndex::align(at(10, 7, 0), Duration::from_secs(900));
        assert_eq!(index.to_string(), "202406011000");

        let index = AcquisitionIndex::align(at(10, 22, 0), Duration::from_secs(900));
        assert_eq!(index.to_string(), "202406011015");
    }

    #[test]
    fn test_align_exact_boundary_is_identity() {
        let now = at(10, 30, 0);
        let index = AcquisitionIndex::align(now, Duration::from_secs(900));
        assert_eq!(index.instant(), now);
    }

    #[test]
    fn test_align_never_exceeds_now() {
        for interval in [60u64, 420, 900, 3600, 7200] {
            for (h, m, s) in [(0, 0, 0), (9, 59, 59), (10, 7, 33), (23, 59, 1)] {
                let now = at(h, m, s);
                let aligned = AcquisitionIndex::align(now, Duration::from_secs(interval)).instant();
                assert!(aligned <= now, "aligned {aligned} > now {now}");
                let gap = (now - aligned).num_seconds() as u64;
                assert!(gap < interval, "gap {gap}s >= interval {interval}s");
            }
        }
    }

    #[test]
    fn test_align_interval_above_one_hour() {
        // Epoch flooring keeps multi-hour intervals on a stable grid.
        let index = AcquisitionIndex::align(at(11, 10, 0), Duration::from_secs(7200));
        assert_eq!(index.to_string(), "202406011000");
    }

    #[test]
    fn test_components_zero_padded() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 3, 4, 0).unwrap();
        let index = AcquisitionIndex::align(now, Duration::from_secs(60));
        assert_eq!(index.year(), "2024");
        assert_eq!(index.month(), "01");
        assert_eq!(index.day(), "05");
        assert_eq!(index.hour(), "03");
        assert_eq!(index.minute(), "04");
    }

    #[test]
    fn test_align_monotonic() {
        let interval = Duration::from_secs(900);
        let earlier = AcquisitionIndex::align(at(10, 7, 0), interval);
        let later = AcquisitionIndex::align(at(10, 8, 0), interval);
        assert!(earlier <= later);
    }
}

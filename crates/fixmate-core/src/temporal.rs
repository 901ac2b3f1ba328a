//! # Temporal Types — UTC Timestamps and Clocks
//!
//! Defines `Timestamp`, a UTC-only instant truncated to seconds precision,
//! and the [`Clock`] abstraction every deadline check reads from.
//!
//! ## Design
//!
//! Escrow holds, dispute windows and dispute deadlines are all compared at
//! second granularity. Truncating at construction makes boundary checks
//! (`deadline - 1s` accepted, `deadline + 1s` rejected) deterministic.

use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A UTC timestamp, truncated to seconds precision.
///
/// Serializes as RFC 3339 with `Z` suffix (`2026-01-15T12:00:00Z`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated.
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// From a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt.with_nanosecond(0).unwrap_or(dt))
    }

    /// From Unix epoch seconds. `None` if out of range.
    pub fn from_epoch_secs(secs: i64) -> Option<Self> {
        DateTime::from_timestamp(secs, 0).map(Self)
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// This instant shifted forward by `d`.
    pub fn plus(&self, d: Duration) -> Self {
        Self::from_utc(self.0 + d)
    }

    /// This instant shifted back by `d`.
    pub fn minus(&self, d: Duration) -> Self {
        Self::from_utc(self.0 - d)
    }

    /// Render as ISO 8601 with Z suffix.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_utc(dt)
    }
}

// ── Clocks ─────────────────────────────────────────────────────────────

/// Source of the current instant.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, to: Timestamp) {
        *self.now.lock() = to;
    }

    /// Move forward by `d`.
    pub fn advance(&self, d: Duration) {
        let mut guard = self.now.lock();
        *guard = guard.plus(d);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn truncates_subseconds() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
            + Duration::milliseconds(750);
        let ts = Timestamp::from_utc(dt);
        assert_eq!(ts.to_iso8601(), "2026-01-15T12:00:00Z");
        assert_eq!(ts.as_datetime().nanosecond(), 0);
    }

    #[test]
    fn plus_and_minus() {
        let ts = Timestamp::from_epoch_secs(1_000).unwrap();
        assert_eq!(ts.plus(Duration::seconds(5)).epoch_secs(), 1_005);
        assert_eq!(ts.minus(Duration::seconds(5)).epoch_secs(), 995);
        assert!(ts.plus(Duration::seconds(1)) > ts);
    }

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let start = Timestamp::from_epoch_secs(1_700_000_000).unwrap();
        let clock = ManualClock::new(start);
        let other = clock.clone();
        clock.advance(Duration::hours(1));
        assert_eq!(other.now(), start.plus(Duration::hours(1)));
        other.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn serializes_with_z_suffix() {
        let ts = Timestamp::from_utc(Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap());
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2026-03-01T08:30:00Z\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}

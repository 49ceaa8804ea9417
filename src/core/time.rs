//! Wall-clock time in epoch milliseconds.
//!
//! Every state write is stamped from a [`Clock`]. Tests drive a
//! [`ManualClock`]; everything else uses [`SystemClock`].

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Milliseconds since the Unix epoch
pub type EpochMillis = i64;

/// Time constants for conversions
pub mod constants {
    use super::EpochMillis;

    pub const MILLIS_PER_SECOND: EpochMillis = 1_000;
    pub const MILLIS_PER_MINUTE: EpochMillis = 60 * MILLIS_PER_SECOND;
}

/// Source of "now" for state stamping and staleness checks.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_millis(&self) -> EpochMillis;
}

/// Real wall clock backed by chrono.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> EpochMillis {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Hand-driven clock. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: EpochMillis) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    pub fn set(&self, millis: EpochMillis) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: EpochMillis) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> EpochMillis {
        self.now.load(Ordering::SeqCst)
    }
}

/// Hands out strictly increasing timestamps for a single writer.
///
/// Two writes inside the same millisecond (or a clock that steps backwards)
/// still get distinct, ordered stamps.
#[derive(Debug, Clone, Default)]
pub struct StampSequence {
    last: Option<EpochMillis>,
}

impl StampSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next stamp at or after `now`
    pub fn next(&mut self, now: EpochMillis) -> EpochMillis {
        let stamp = match self.last {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last = Some(stamp);
        stamp
    }
}

/// Age of a stamp relative to `now`, never negative
#[inline]
pub fn age(now: EpochMillis, stamp: EpochMillis) -> EpochMillis {
    now.saturating_sub(stamp).max(0)
}

/// Convert seconds (f64) to milliseconds
#[inline]
pub fn from_seconds(seconds: f64) -> EpochMillis {
    (seconds * constants::MILLIS_PER_SECOND as f64) as EpochMillis
}

/// Format a playback position (seconds) as MM:SS.mmm
pub fn format_position(seconds: f64) -> String {
    let millis = from_seconds(seconds.max(0.0));
    let minutes = millis / constants::MILLIS_PER_MINUTE;
    let secs = (millis % constants::MILLIS_PER_MINUTE) / constants::MILLIS_PER_SECOND;
    format!("{:02}:{:02}.{:03}", minutes, secs, millis % 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();
        clock.advance(500);
        assert_eq!(other.now_millis(), 1_500);
        other.set(10);
        assert_eq!(clock.now_millis(), 10);
    }

    #[test]
    fn test_stamp_sequence_strictly_increases() {
        let mut stamps = StampSequence::new();
        assert_eq!(stamps.next(100), 100);
        assert_eq!(stamps.next(100), 101);
        assert_eq!(stamps.next(50), 102);
        assert_eq!(stamps.next(500), 500);
    }

    #[test]
    fn test_age_never_negative() {
        assert_eq!(age(1_000, 400), 600);
        assert_eq!(age(400, 1_000), 0);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01 in epoch millis
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_format_position() {
        assert_eq!(format_position(0.0), "00:00.000");
        assert_eq!(format_position(42.5), "00:42.500");
        assert_eq!(format_position(61.25), "01:01.250");
        assert_eq!(format_position(-3.0), "00:00.000");
    }
}

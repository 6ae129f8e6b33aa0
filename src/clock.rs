//! Time sources for the collection
//!
//! Scheduling never reads the system time directly. A collection is handed a
//! [`Clock`] when it is opened, so tests can drive it through whole simulated
//! days with a [`ManualClock`].

use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

pub const SECONDS_PER_DAY: i64 = 86_400;

/// A source of the current time
pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds
    fn now_millis(&self) -> i64;

    /// Current time in epoch seconds
    fn now_secs(&self) -> i64 {
        self.now_millis().div_euclid(1000)
    }
}

/// Reads the wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to
///
/// Clones share the same underlying time, so a test can keep a handle after
/// giving the clock to a collection.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    /// Creates a clock frozen at the given epoch seconds
    pub fn at_secs(secs: i64) -> Self {
        Self { millis: Arc::new(AtomicI64::new(secs * 1000)) }
    }

    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance_millis(secs * 1000);
    }

    pub fn advance_days(&self, days: i64) {
        self.advance_secs(days * SECONDS_PER_DAY);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Start of the UTC day containing `secs`
pub fn start_of_day(secs: i64) -> i64 {
    secs - secs.rem_euclid(SECONDS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::at_secs(1_000);
        let handle = clock.clone();
        handle.advance_secs(5);
        assert_eq!(clock.now_secs(), 1_005);
        handle.advance_days(1);
        assert_eq!(clock.now_secs(), 1_005 + SECONDS_PER_DAY);
    }

    #[test]
    fn test_now_secs_rounds_down() {
        let clock = ManualClock::at_secs(0);
        clock.set_millis(1_999);
        assert_eq!(clock.now_secs(), 1);
        clock.set_millis(-1);
        assert_eq!(clock.now_secs(), -1);
    }

    #[test]
    fn test_start_of_day() {
        assert_eq!(start_of_day(SECONDS_PER_DAY * 3 + 17), SECONDS_PER_DAY * 3);
        assert_eq!(start_of_day(SECONDS_PER_DAY * 3), SECONDS_PER_DAY * 3);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01
        assert!(SystemClock.now_secs() > 1_577_836_800);
    }
}

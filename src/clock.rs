//! Wall-clock sources for countdown arithmetic.
//!
//! The tracker never reads the system time directly; it asks an injected
//! [`Clock`] so tests can control "now".

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Wall time anchored at construction and advanced by tokio's monotonic clock.
///
/// Under a paused tokio runtime (`start_paused = true`) this follows virtual
/// time, so timers and countdowns stay consistent with each other.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    anchor_wall: DateTime<Utc>,
    anchor: tokio::time::Instant,
}

impl MonotonicClock {
    /// Anchor `wall` at the current tokio instant.
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            anchor_wall: wall,
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.anchor.elapsed()).unwrap_or(TimeDelta::MAX);
        self.anchor_wall.checked_add_signed(elapsed).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_738_300_800, 0).unwrap()
    }

    #[test]
    fn test_system_clock_is_recent() {
        let now = SystemClock.now();
        assert!(now.timestamp() > 1_577_836_800); // 2020-01-01
    }

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(epoch());
        assert_eq!(clock.now(), epoch());

        clock.advance(TimeDelta::minutes(5));
        assert_eq!(clock.now(), epoch() + TimeDelta::minutes(5));

        clock.set(epoch());
        assert_eq!(clock.now(), epoch());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_clock_follows_paused_time() {
        let clock = MonotonicClock::starting_at(epoch());
        assert_eq!(clock.now(), epoch());

        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(clock.now(), epoch() + TimeDelta::seconds(90));
    }
}

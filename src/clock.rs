//! # Clock
//!
//! Time source consumed by the dispatcher and the audit interceptor. Wall-clock
//! time stamps records and commands; the monotonic instant measures durations.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;

    /// Current monotonic instant
    fn instant(&self) -> Instant;

    /// Whole milliseconds elapsed since `start`, never negative
    fn elapsed_ms(&self, start: Instant) -> u64 {
        let elapsed = self.instant().saturating_duration_since(start);
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

/// System time source
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }
}

/// Shared handle to the system clock
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Manually advanced clock for deterministic tests
#[derive(Debug)]
pub struct ManualClock {
    wall: Mutex<DateTime<Utc>>,
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            wall: Mutex::new(start),
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move both the wall clock and the monotonic clock forward
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
        let mut wall = self.wall.lock();
        *wall += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.wall.lock()
    }

    fn instant(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances_both_sources() {
        let start = Utc.with_ymd_and_hms(2122, 6, 3, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let began = clock.instant();

        clock.advance(Duration::from_millis(1_500));

        assert_eq!(clock.elapsed_ms(began), 1_500);
        assert_eq!(clock.now(), start + chrono::Duration::milliseconds(1_500));
    }

    #[test]
    fn test_elapsed_is_never_negative() {
        let clock = SystemClock;
        let later = clock.instant() + Duration::from_secs(60);
        assert_eq!(clock.elapsed_ms(later), 0);
    }
}

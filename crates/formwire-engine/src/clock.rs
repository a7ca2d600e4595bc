//! Wall-clock sources for the date built-ins.

use std::cell::Cell;
use std::time::Duration;

use chrono::Utc;

/// Supplies the current time as milliseconds since the Unix epoch.
pub trait Clock {
    fn now_millis(&self) -> i64;

    /// Moves a simulated clock forward. Real clocks ignore this.
    fn advance(&self, _elapsed: Duration) {}
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to. Used by tests and scripted replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: Cell<i64>,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: Cell::new(start_millis),
        }
    }

    pub fn set(&self, millis: i64) {
        self.millis.set(millis);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.get()
    }

    fn advance(&self, elapsed: Duration) {
        let delta = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
        self.millis.set(self.millis.get().saturating_add(delta));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now_millis(), 1_250);
        clock.set(5);
        assert_eq!(clock.now_millis(), 5);
    }

    #[test]
    fn system_clock_ignores_advance() {
        let clock = SystemClock;
        let before = clock.now_millis();
        clock.advance(Duration::from_secs(3600));
        assert!(clock.now_millis() - before < 3_600_000);
    }
}

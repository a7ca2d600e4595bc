//! The clock timer behind `now()`, `today()` and `currentTime()`.
//!
//! There is no background thread: the host calls [`IntervalTimer::advance`]
//! with the elapsed time and the timer fires once per whole interval.

use std::cell::Cell;
use std::time::Duration;

use formwire_channels::Channel;
use tracing::{debug, trace};

pub struct IntervalTimer {
    interval: Cell<Duration>,
    elapsed: Cell<Duration>,
    running: Cell<bool>,
    tick: Channel<()>,
    ticks: Cell<u64>,
}

impl IntervalTimer {
    /// A stopped timer emitting on `tick`.
    pub fn new(interval: Duration, tick: Channel<()>) -> Self {
        Self {
            interval: Cell::new(interval),
            elapsed: Cell::new(Duration::ZERO),
            running: Cell::new(false),
            tick,
            ticks: Cell::new(0),
        }
    }

    pub fn start(&self) {
        if self.running.replace(true) {
            return;
        }
        self.elapsed.set(Duration::ZERO);
        debug!(interval_ms = self.interval.get().as_millis() as u64, "timer started");
    }

    pub fn stop(&self) {
        if self.running.replace(false) {
            debug!(ticks = self.ticks.get(), "timer stopped");
        }
    }

    /// Restarts with a new interval; the partial period is discarded.
    pub fn restart(&self, interval: Duration) {
        self.stop();
        self.interval.set(interval);
        self.start();
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn interval(&self) -> Duration {
        self.interval.get()
    }

    /// Total ticks fired since creation.
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }

    /// Moves the timer forward by `elapsed`, emitting one tick per completed
    /// interval. Returns the number of ticks fired.
    pub fn advance(&self, elapsed: Duration) -> u32 {
        let interval = self.interval.get();
        if !self.running.get() || interval.is_zero() {
            return 0;
        }
        let mut pending = self.elapsed.get() + elapsed;
        let mut fired = 0;
        while pending >= interval && self.running.get() {
            pending -= interval;
            fired += 1;
            self.ticks.set(self.ticks.get() + 1);
            trace!(tick = self.ticks.get(), "timer tick");
            self.tick.emit(());
        }
        self.elapsed.set(pending);
        fired
    }
}

//! Time sources for the tracking loop
//!
//! Every duration check in the tracker goes through a [`Clock`], so a run can
//! be driven by wall-clock time against real hardware or by a virtual clock
//! shared with a simulated instrument.

use chrono::Utc;
use std::cell::Cell;
use std::rc::Rc;

/// A monotonic-enough source of seconds
pub trait Clock {
    /// Current time [s]
    fn now(&self) -> f64;
}

/// Wall-clock time, seconds since the Unix epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        Utc::now().timestamp_micros() as f64 * 1e-6
    }
}

/// Virtual clock that only moves when told to
///
/// Clones share the same time, so the simulated instrument can advance it while
/// the tracker reads it.
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    now: Rc<Cell<f64>>,
}

impl SimulatedClock {
    /// Create a clock starting at `start` seconds
    pub fn starting_at(start: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Move time forward by `seconds` (negative values are ignored)
    pub fn advance(&self, seconds: f64) {
        if seconds > 0.0 {
            self.now.set(self.now.get() + seconds);
        }
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

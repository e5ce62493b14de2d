//! Live per-sample reporting
//!
//! The tracker invokes the callback synchronously for every dwell reading; the
//! reporter keeps a running tally and logs every Nth reading.

use mppt_tracker::Sample;

/// Logs a progress line every `every` readings
#[derive(Debug, Default)]
pub struct LiveReporter {
    every: usize,
    seen: usize,
    energy: f64,
    last_timestamp: Option<f64>,
}

impl LiveReporter {
    pub fn new(every: usize) -> Self {
        Self {
            every,
            ..Self::default()
        }
    }

    /// Handle one reading
    pub fn on_sample(&mut self, sample: &Sample) {
        self.seen += 1;
        if let Some(last) = self.last_timestamp {
            self.energy += sample.power() * (sample.timestamp - last);
        }
        self.last_timestamp = Some(sample.timestamp);

        log::trace!(
            "t={:.3}s V={:.4} V I={:.6} A",
            sample.timestamp,
            sample.voltage,
            sample.current
        );
        if self.every > 0 && self.seen % self.every == 0 {
            log::info!(
                "[{:>6}] t={:8.2}s  {:.2} mV  {:.3} mA  {:.4} mW",
                self.seen,
                sample.timestamp,
                sample.voltage * 1000.0,
                sample.current * 1000.0,
                sample.power() * 1000.0
            );
        }
    }

    /// Readings seen so far
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Energy harvested across the reported readings [J]
    ///
    /// Gaps between dwells (scans) are bridged by the first reading after them.
    pub fn energy(&self) -> f64 {
        self.energy
    }
}

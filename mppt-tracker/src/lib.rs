//! Maximum Power Point Tracker Library
//!
//! Locates and continuously re-locates the maximum power point (Mpp) of a power
//! source whose current-voltage curve drifts over time, such as a solar cell
//! under changing light, using a generic source-measure instrument.
//!
//! # Architecture
//!
//! A tracking run is a small state machine:
//! - An initial soak at the estimated Mpp yields a stable starting current
//! - An exploration scan walks the voltage outward in both directions until the
//!   operating point has swung a bounded angle away from the Mpp (or hits 0 V or
//!   Voc), then picks the best reading along the way
//! - A dwell holds the new Mpp for a while, sampling as it goes
//! - Scan and dwell alternate until the time budget is spent
//!
//! The library does NOT:
//! - Measure Voc (it must be known before tracking starts)
//! - Implement a hardware driver (anything implementing [`InstrumentPort`] works)
//! - Write reports or files
//!
//! A simulated source meter and virtual clock are included so runs can be
//! exercised without hardware.
//!
//! # Example Usage
//!
//! ```
//! use mppt_tracker::{
//!     Illumination, PvCell, SimulatedClock, SimulatedSourceMeter, Tracker, TrackerState,
//! };
//!
//! let clock = SimulatedClock::default();
//! let cell = PvCell::default();
//! let meter = SimulatedSourceMeter::new(clock.clone(), cell)
//!     .with_illumination(Illumination::Step { before: 1.0, after: 0.5, at: 30.0 });
//! let mut tracker = Tracker::new(meter, clock);
//!
//! // Voc comes from an upstream measurement
//! let mut state = TrackerState::new().with_voc(cell.open_circuit_voltage(1.0));
//!
//! let mut live = |sample: &mppt_tracker::Sample| {
//!     let _ = sample.power();
//! };
//! let samples = tracker.launch_tracker(&mut state, 60.0, Some(&mut live), None).unwrap();
//!
//! println!("{} readings, Mpp now at {:?} V", samples.len(), state.vmpp);
//!
//! // The same state seeds the next run
//! let more = tracker.launch_tracker(&mut state, 20.0, None, None).unwrap();
//! assert!(!more.is_empty());
//! ```

// Public modules
pub mod clock;
pub mod config;
pub mod extremum;
pub mod instrument;
pub mod state;
pub mod tracker;
pub mod types;

// Re-export main types for convenience
pub use clock::{Clock, SimulatedClock, SystemClock};
pub use config::{SenseRange, TrackerConfig};
pub use extremum::{operating_angle, which_max_power};
pub use instrument::{
    Illumination, InstrumentPort, InstrumentStats, MeasurementTiming, PvCell, SampleCallback,
    SimulatedSourceMeter,
};
pub use state::TrackerState;
pub use tracker::Tracker;
pub use types::{MaxPower, Result, Sample, SampleStatus, TrackerError, TrackerPhase};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: a tracker can be assembled from the public parts
        let clock = SimulatedClock::default();
        let meter = SimulatedSourceMeter::new(clock.clone(), PvCell::default());
        let tracker = Tracker::new(meter, clock);
        assert_eq!(tracker.config(), &TrackerConfig::default());
        assert_eq!(tracker.instrument().stats().total_calls(), 0);
    }
}

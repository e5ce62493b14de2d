//! Core types for the maximum power point tracker
//!
//! This module defines the fundamental values that flow through a tracking run:
//! instrument readings, the result of picking the best reading out of a batch,
//! the phases of the tracking state machine, and the library error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Opaque status word reported by the instrument alongside a reading
///
/// The tracker never interprets it; it is carried through to the sample
/// history untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleStatus(pub u32);

impl SampleStatus {
    /// Bit set by the simulated source meter when the reading hit the compliance limit
    pub const IN_COMPLIANCE: u32 = 1 << 3;

    /// Check whether a given status bit is set
    pub fn has(&self, bit: u32) -> bool {
        self.0 & bit != 0
    }
}

/// One instantaneous instrument reading
///
/// Current is negative while the device under test is delivering power, so
/// generated power is `-(voltage * current)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Measured voltage [V]
    pub voltage: f64,
    /// Measured current [A]
    pub current: f64,
    /// Acquisition time in seconds on the run clock
    pub timestamp: f64,
    /// Raw instrument status word
    pub status: SampleStatus,
}

impl Sample {
    /// Create a new sample
    pub fn new(voltage: f64, current: f64, timestamp: f64, status: SampleStatus) -> Self {
        Self {
            voltage,
            current,
            timestamp,
            status,
        }
    }

    /// Generated power [W]; positive while the device is sourcing
    pub fn power(&self) -> f64 {
        -(self.voltage * self.current)
    }
}

/// Output of the extremum selector: the highest-power sample in a batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxPower {
    /// Maximum generated power [W]
    pub power: f64,
    /// Voltage of the winning sample [V]
    pub voltage: f64,
    /// Current of the winning sample [A]
    pub current: f64,
    /// Position of the winning sample in the batch
    pub index: usize,
}

/// States of the tracking loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    /// Run requested, nothing done yet
    NotStarted,
    /// Holding at the seeded Mpp to get a stable starting current
    InitialSoak,
    /// Walking voltage outward to bracket the new Mpp
    Exploring,
    /// Holding at the freshly found Mpp
    Dwelling,
    /// Time budget spent (or Voc unknown); terminal
    Done,
}

impl fmt::Display for TrackerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerPhase::NotStarted => write!(f, "NotStarted"),
            TrackerPhase::InitialSoak => write!(f, "InitialSoak"),
            TrackerPhase::Exploring => write!(f, "Exploring"),
            TrackerPhase::Dwelling => write!(f, "Dwelling"),
            TrackerPhase::Done => write!(f, "Done"),
        }
    }
}

/// Errors that can occur while tracking
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Open-circuit voltage (Voc) is not known")]
    VocUnknown,

    #[error("Instrument error: {0}")]
    Instrument(String),

    #[error("Invalid tracker configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid tracker state: {0}")]
    InvalidState(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_power_sign() {
        // Sourcing quadrant: positive voltage, negative current
        let generating = Sample::new(0.5, -0.02, 0.0, SampleStatus::default());
        assert!((generating.power() - 0.01).abs() < 1e-12);

        let absorbing = Sample::new(0.5, 0.02, 0.0, SampleStatus::default());
        assert!(absorbing.power() < 0.0);
    }

    #[test]
    fn test_status_bits() {
        let status = SampleStatus(SampleStatus::IN_COMPLIANCE);
        assert!(status.has(SampleStatus::IN_COMPLIANCE));
        assert!(!SampleStatus::default().has(SampleStatus::IN_COMPLIANCE));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(format!("{}", TrackerPhase::InitialSoak), "InitialSoak");
        assert_eq!(format!("{}", TrackerPhase::Done), "Done");
    }
}

//! Tracker configuration types
//!
//! This module holds the algorithm constants of the tracker. Everything here is
//! fixed for the lifetime of a `Tracker`; the values that evolve from run to run
//! (Voc, Mpp estimate, compliance) live in [`crate::TrackerState`].

use crate::types::{Result, TrackerError};
use serde::{Deserialize, Serialize};

/// Current sense range requested from the instrument
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenseRange {
    /// Let the instrument pick the range
    #[default]
    Auto,
    /// Fixed range with the given full scale [A]
    Fixed(f64),
}

/// Configuration for the tracking algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Exploration step is `Voc / scan_step_divisions` (default: 301)
    #[serde(default = "default_step_divisions")]
    pub scan_step_divisions: u32,

    /// Angular deviation from the Mpp angle that marks an edge [deg] (default: 7)
    #[serde(default = "default_max_angle")]
    pub max_angle_deviation_deg: f64,

    /// Seed Vmpp as this fraction of Voc when none is known (default: 0.7)
    #[serde(default = "default_vmpp_fraction")]
    pub initial_vmpp_fraction: f64,

    /// Compliance used for the initial soak when none is known [A] (default: 0.04)
    #[serde(default = "default_provisional_compliance")]
    pub provisional_compliance: f64,

    /// Longest initial soak, also the short-run threshold [s] (default: 10)
    #[serde(default = "default_max_initial_soak")]
    pub max_initial_soak: f64,

    /// Fraction of a short run spent soaking (default: 0.2)
    #[serde(default = "default_short_run_soak_fraction")]
    pub short_run_soak_fraction: f64,

    /// Committed compliance is this multiple of |Impp| (default: 2)
    #[serde(default = "default_compliance_headroom")]
    pub compliance_headroom: f64,

    /// Isc estimate as a multiple of Impp when none is known (default: 1.1)
    #[serde(default = "default_isc_over_impp")]
    pub isc_over_impp: f64,

    /// Sense range passed to instrument setup
    #[serde(default)]
    pub sense_range: SenseRange,
}

fn default_step_divisions() -> u32 {
    301
}

fn default_max_angle() -> f64 {
    7.0
}

fn default_vmpp_fraction() -> f64 {
    0.7
}

fn default_provisional_compliance() -> f64 {
    0.04
}

fn default_max_initial_soak() -> f64 {
    10.0
}

fn default_short_run_soak_fraction() -> f64 {
    0.2
}

fn default_compliance_headroom() -> f64 {
    2.0
}

fn default_isc_over_impp() -> f64 {
    1.1
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            scan_step_divisions: default_step_divisions(),
            max_angle_deviation_deg: default_max_angle(),
            initial_vmpp_fraction: default_vmpp_fraction(),
            provisional_compliance: default_provisional_compliance(),
            max_initial_soak: default_max_initial_soak(),
            short_run_soak_fraction: default_short_run_soak_fraction(),
            compliance_headroom: default_compliance_headroom(),
            isc_over_impp: default_isc_over_impp(),
            sense_range: SenseRange::default(),
        }
    }
}

impl TrackerConfig {
    /// Create a new tracker configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the number of exploration steps across Voc
    pub fn with_step_divisions(mut self, divisions: u32) -> Self {
        self.scan_step_divisions = divisions;
        self
    }

    /// Builder method: set the angular edge criterion [deg]
    pub fn with_max_angle_deviation(mut self, degrees: f64) -> Self {
        self.max_angle_deviation_deg = degrees;
        self
    }

    /// Builder method: set the seed Vmpp fraction of Voc
    pub fn with_initial_vmpp_fraction(mut self, fraction: f64) -> Self {
        self.initial_vmpp_fraction = fraction;
        self
    }

    /// Builder method: set the provisional soak compliance [A]
    pub fn with_provisional_compliance(mut self, amps: f64) -> Self {
        self.provisional_compliance = amps;
        self
    }

    /// Builder method: set the sense range
    pub fn with_sense_range(mut self, range: SenseRange) -> Self {
        self.sense_range = range;
        self
    }

    /// Length of the initial soak for a run of `total_duration` seconds
    pub fn initial_soak_duration(&self, total_duration: f64) -> f64 {
        if total_duration <= self.max_initial_soak {
            total_duration * self.short_run_soak_fraction
        } else {
            self.max_initial_soak
        }
    }

    /// Reject settings the tracking loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.scan_step_divisions == 0 {
            return Err(TrackerError::InvalidConfig(
                "scan_step_divisions must be at least 1".to_string(),
            ));
        }
        if !(self.max_angle_deviation_deg > 0.0 && self.max_angle_deviation_deg < 180.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "max_angle_deviation_deg must be in (0, 180), got {}",
                self.max_angle_deviation_deg
            )));
        }
        if !(0.0..=1.0).contains(&self.initial_vmpp_fraction) {
            return Err(TrackerError::InvalidConfig(format!(
                "initial_vmpp_fraction must be in [0, 1], got {}",
                self.initial_vmpp_fraction
            )));
        }
        if !(self.short_run_soak_fraction > 0.0 && self.short_run_soak_fraction <= 1.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "short_run_soak_fraction must be in (0, 1], got {}",
                self.short_run_soak_fraction
            )));
        }
        for (name, value) in [
            ("provisional_compliance", self.provisional_compliance),
            ("max_initial_soak", self.max_initial_soak),
            ("compliance_headroom", self.compliance_headroom),
            ("isc_over_impp", self.isc_over_impp),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(TrackerError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_config_builder() {
        let config = TrackerConfig::new()
            .with_step_divisions(101)
            .with_max_angle_deviation(5.0)
            .with_initial_vmpp_fraction(0.8)
            .with_provisional_compliance(0.1)
            .with_sense_range(SenseRange::Fixed(0.1));

        assert_eq!(config.scan_step_divisions, 101);
        assert_eq!(config.max_angle_deviation_deg, 5.0);
        assert_eq!(config.initial_vmpp_fraction, 0.8);
        assert_eq!(config.provisional_compliance, 0.1);
        assert_eq!(config.sense_range, SenseRange::Fixed(0.1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_initial_soak_duration() {
        let config = TrackerConfig::new();

        assert!((config.initial_soak_duration(4.0) - 0.8).abs() < 1e-12);
        assert!((config.initial_soak_duration(10.0) - 2.0).abs() < 1e-12);
        assert_eq!(config.initial_soak_duration(10.5), 10.0);
        assert_eq!(config.initial_soak_duration(30.0), 10.0);
    }

    #[test]
    fn test_validation() {
        assert!(TrackerConfig::new().with_step_divisions(0).validate().is_err());
        assert!(TrackerConfig::new().with_max_angle_deviation(0.0).validate().is_err());
        assert!(TrackerConfig::new().with_initial_vmpp_fraction(1.5).validate().is_err());
        assert!(TrackerConfig::new().with_provisional_compliance(-1.0).validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: TrackerConfig =
            serde_json::from_str(r#"{ "max_angle_deviation_deg": 4.5 }"#).unwrap();

        assert_eq!(config.max_angle_deviation_deg, 4.5);
        assert_eq!(config.scan_step_divisions, 301);
        assert_eq!(config.sense_range, SenseRange::Auto);
    }
}

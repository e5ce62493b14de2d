//! Persistent tracker state
//!
//! `TrackerState` is the estimate the tracking loop reads and refines. A caller
//! seeds it before a run and can read it back afterwards (or serialize it) to
//! chain successive runs, e.g. across illumination changes.

use crate::types::{Result, TrackerError};
use serde::{Deserialize, Serialize};

/// Configuration and Mpp estimate carried across tracking runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerState {
    /// Open-circuit voltage [V]; must be known before tracking starts
    #[serde(default)]
    pub voc: Option<f64>,

    /// Short-circuit current estimate [A]
    #[serde(default)]
    pub isc: Option<f64>,

    /// Voltage at the best known max power point [V]
    #[serde(default)]
    pub vmpp: Option<f64>,

    /// Current at the best known max power point [A]
    #[serde(default)]
    pub impp: Option<f64>,

    /// Current limit applied while sourcing voltage [A]
    #[serde(default)]
    pub current_compliance: Option<f64>,

    /// Nominal seconds to hold at a newly found Mpp (default: 10)
    #[serde(default = "default_dwell_time")]
    pub dwell_time: f64,

    /// Clock reading at the start of the current (or last) run [s]
    #[serde(default)]
    pub t0: Option<f64>,
}

fn default_dwell_time() -> f64 {
    10.0
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            voc: None,
            isc: None,
            vmpp: None,
            impp: None,
            current_compliance: None,
            dwell_time: default_dwell_time(),
            t0: None,
        }
    }
}

impl TrackerState {
    /// Create an empty state (nothing known, default dwell time)
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the open-circuit voltage
    pub fn with_voc(mut self, voc: f64) -> Self {
        self.voc = Some(voc);
        self
    }

    /// Builder method: set the short-circuit current estimate
    pub fn with_isc(mut self, isc: f64) -> Self {
        self.isc = Some(isc);
        self
    }

    /// Builder method: seed the Mpp voltage
    pub fn with_vmpp(mut self, vmpp: f64) -> Self {
        self.vmpp = Some(vmpp);
        self
    }

    /// Builder method: set the compliance current
    pub fn with_current_compliance(mut self, amps: f64) -> Self {
        self.current_compliance = Some(amps);
        self
    }

    /// Builder method: set the dwell time [s]
    pub fn with_dwell_time(mut self, seconds: f64) -> Self {
        self.dwell_time = seconds;
        self
    }

    /// Forget everything learned so far; the dwell time is kept
    pub fn reset(&mut self) {
        *self = Self {
            dwell_time: self.dwell_time,
            ..Self::default()
        };
    }

    /// Voc, or `VocUnknown` if it has not been provided
    pub fn require_voc(&self) -> Result<f64> {
        self.voc.ok_or(TrackerError::VocUnknown)
    }

    /// Check that the known values are usable for a run
    ///
    /// Voc must be finite and non-zero (the scan step is a fraction of it), and
    /// every other seeded value must be finite.
    pub fn validate(&self) -> Result<()> {
        let voc = self.require_voc()?;
        if !voc.is_finite() || voc == 0.0 {
            return Err(TrackerError::InvalidState(format!(
                "Voc must be finite and non-zero, got {}",
                voc
            )));
        }
        for (name, value) in [
            ("Isc", self.isc),
            ("Vmpp", self.vmpp),
            ("Impp", self.impp),
            ("current compliance", self.current_compliance),
        ] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(TrackerError::InvalidState(format!(
                        "{} must be finite, got {}",
                        name, v
                    )));
                }
            }
        }
        if !(self.dwell_time.is_finite() && self.dwell_time >= 0.0) {
            return Err(TrackerError::InvalidState(format!(
                "dwell time must be non-negative, got {}",
                self.dwell_time
            )));
        }
        Ok(())
    }

    /// Clamp a voltage into the closed interval between 0 and Voc
    ///
    /// Works for either polarity of Voc.
    pub fn clamp_to_operating_range(&self, voltage: f64) -> Result<f64> {
        let voc = self.require_voc()?;
        let (low, high) = if voc >= 0.0 { (0.0, voc) } else { (voc, 0.0) };
        Ok(voltage.clamp(low, high))
    }

    /// Power at the current Mpp estimate [W], if one exists
    pub fn mpp_power(&self) -> Option<f64> {
        Some(-(self.vmpp? * self.impp?))
    }
}

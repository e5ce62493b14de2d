//! Photovoltaic cell model for the simulated instrument
//!
//! Single-diode model with a shunt resistance:
//!
//! ```text
//! I_gen(V) = G * I_ph - I_0 * (exp(V / (n * V_t)) - 1) - V / R_sh
//! ```
//!
//! The instrument convention is that current flowing out of the device while it
//! generates is reported negative, so `current_at` returns `-I_gen`.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Single-diode photovoltaic cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PvCell {
    /// Photocurrent at unit illumination [A]
    #[serde(default = "default_photocurrent")]
    pub photocurrent: f64,
    /// Diode saturation current [A]
    #[serde(default = "default_saturation_current")]
    pub saturation_current: f64,
    /// Ideality factor times thermal voltage [V]
    #[serde(default = "default_diode_voltage")]
    pub diode_voltage: f64,
    /// Shunt resistance [ohm]
    #[serde(default = "default_shunt_resistance")]
    pub shunt_resistance: f64,
}

fn default_photocurrent() -> f64 {
    0.025
}

fn default_saturation_current() -> f64 {
    1e-9
}

fn default_diode_voltage() -> f64 {
    // n = 1.5 at 300 K
    1.5 * 0.025852
}

fn default_shunt_resistance() -> f64 {
    1000.0
}

impl Default for PvCell {
    fn default() -> Self {
        Self {
            photocurrent: default_photocurrent(),
            saturation_current: default_saturation_current(),
            diode_voltage: default_diode_voltage(),
            shunt_resistance: default_shunt_resistance(),
        }
    }
}

impl PvCell {
    /// Generated current at `voltage` under `illumination` (1.0 = nominal) [A]
    pub fn generated_current(&self, voltage: f64, illumination: f64) -> f64 {
        illumination * self.photocurrent
            - self.saturation_current * ((voltage / self.diode_voltage).exp() - 1.0)
            - voltage / self.shunt_resistance
    }

    /// Current as an instrument would report it (negative while generating)
    pub fn current_at(&self, voltage: f64, illumination: f64) -> f64 {
        -self.generated_current(voltage, illumination)
    }

    /// Voltage where the generated current crosses zero [V]
    pub fn open_circuit_voltage(&self, illumination: f64) -> f64 {
        let photocurrent = (illumination * self.photocurrent).max(0.0);
        // Without the shunt term this is exact; the shunt only lowers it
        let mut high = self.diode_voltage * (photocurrent / self.saturation_current + 1.0).ln();
        let mut low = 0.0;
        if high <= 0.0 {
            return 0.0;
        }
        for _ in 0..100 {
            let mid = 0.5 * (low + high);
            if self.generated_current(mid, illumination) > 0.0 {
                low = mid;
            } else {
                high = mid;
            }
        }
        0.5 * (low + high)
    }

    /// True maximum power point as `(voltage, current, power)`
    ///
    /// Dense search over `[0, Voc]`; meant for checking tracker results.
    pub fn max_power_point(&self, illumination: f64) -> (f64, f64, f64) {
        const POINTS: usize = 20_000;
        let voc = self.open_circuit_voltage(illumination);
        let mut best = (0.0, self.current_at(0.0, illumination), 0.0);
        for n in 0..=POINTS {
            let v = voc * n as f64 / POINTS as f64;
            let i = self.current_at(v, illumination);
            let p = -(v * i);
            if p > best.2 {
                best = (v, i, p);
            }
        }
        best
    }
}

/// Illumination level over time (1.0 = nominal)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Illumination {
    /// Fixed level
    Constant { level: f64 },
    /// Jump from `before` to `after` at `at` seconds
    Step { before: f64, after: f64, at: f64 },
    /// `mean + amplitude * sin(2 pi t / period)`
    Sine { mean: f64, amplitude: f64, period: f64 },
}

impl Default for Illumination {
    fn default() -> Self {
        Illumination::Constant { level: 1.0 }
    }
}

impl Illumination {
    /// Illumination level at time `t` [s], never negative
    pub fn at(&self, t: f64) -> f64 {
        let level = match *self {
            Illumination::Constant { level } => level,
            Illumination::Step { before, after, at } => {
                if t < at {
                    before
                } else {
                    after
                }
            }
            Illumination::Sine {
                mean,
                amplitude,
                period,
            } => {
                if period > 0.0 {
                    mean + amplitude * (2.0 * PI * t / period).sin()
                } else {
                    mean
                }
            }
        };
        level.max(0.0)
    }
}

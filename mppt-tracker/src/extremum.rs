//! Extremum selection and operating-point geometry
//!
//! Pure helpers used by the exploration scan: picking the highest-power reading
//! out of a batch, and the normalized angle of an operating point.

use crate::types::{MaxPower, Sample};

/// Find the sample with the highest generated power
///
/// Power is `-(V * I)`. Ties resolve to the first occurrence. Returns `None`
/// for an empty batch.
pub fn which_max_power(samples: &[Sample]) -> Option<MaxPower> {
    let mut best: Option<MaxPower> = None;

    for (index, sample) in samples.iter().enumerate() {
        let power = sample.power();
        let better = match &best {
            Some(current) => power > current.power,
            None => true,
        };
        if better {
            best = Some(MaxPower {
                power,
                voltage: sample.voltage,
                current: sample.current,
                index,
            });
        }
    }

    best
}

/// Normalized angle of an operating point [deg]
///
/// `atan((i / v) * (voc / isc))`. Scaling by `voc / isc` makes the slope
/// comparable across devices of different size.
pub fn operating_angle(voltage: f64, current: f64, voc: f64, isc: f64) -> f64 {
    (current / voltage * voc / isc).atan().to_degrees()
}

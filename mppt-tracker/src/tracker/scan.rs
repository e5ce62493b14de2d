//! Exploration scan (bounded angle walk)
//!
//! Starting at the current Mpp estimate, the scan steps the voltage in one
//! direction until the operating point has swung far enough (in normalized
//! angle) from the Mpp, or until it would leave the interval between 0 and Voc.
//! It then turns around and does the same on the other side. Once both edges
//! have been touched, the best reading along the way becomes the new Mpp.

use crate::config::TrackerConfig;
use crate::extremum::{operating_angle, which_max_power};
use crate::instrument::InstrumentPort;
use crate::types::{MaxPower, Result, Sample, SampleStatus, TrackerError};
use std::fmt;

/// The two ends of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    High,
    Low,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::High => write!(f, "high"),
            Edge::Low => write!(f, "low"),
        }
    }
}

/// Which edges a scan has touched so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeFlags {
    pub high: bool,
    pub low: bool,
}

impl EdgeFlags {
    /// Mark an edge; returns true if it had not been touched before
    fn touch(&mut self, edge: Edge) -> bool {
        let flag = match edge {
            Edge::High => &mut self.high,
            Edge::Low => &mut self.low,
        };
        let first = !*flag;
        *flag = true;
        first
    }

    /// Both sides of the Mpp have been explored
    pub fn bracketed(&self) -> bool {
        self.high && self.low
    }
}

/// Fixed quantities of one scan
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScanParams {
    pub voc: f64,
    pub isc: f64,
    /// Signed voltage step; starts pointing toward Voc
    pub step: f64,
    pub max_angle_deviation: f64,
}

impl ScanParams {
    pub fn new(voc: f64, isc: f64, config: &TrackerConfig) -> Self {
        Self {
            voc,
            isc,
            step: voc / config.scan_step_divisions as f64,
            max_angle_deviation: config.max_angle_deviation_deg,
        }
    }

    /// Closed operating interval as (low, high), whatever the sign of Voc
    fn interval(&self) -> (f64, f64) {
        if self.voc >= 0.0 {
            (0.0, self.voc)
        } else {
            (self.voc, 0.0)
        }
    }

    /// Edge crossed by stepping to `v_set` in direction `dv`, if any
    ///
    /// Walking up checks the upper bound, walking down the lower one. Both
    /// comparisons are inclusive, so the walk never steps onto a bound.
    fn boundary_edge(&self, v_set: f64, dv: f64) -> Option<(Edge, f64)> {
        let (low, high) = self.interval();
        if dv > 0.0 && v_set >= high {
            Some((Edge::High, high))
        } else if dv < 0.0 && v_set <= low {
            Some((Edge::Low, low))
        } else {
            None
        }
    }
}

/// Result of one exploration scan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanOutcome {
    /// Best point among the starting Mpp and every reading of the scan
    pub best: MaxPower,
    /// Number of readings taken
    pub steps: usize,
    /// Angle of the previous Mpp minus angle of the new one [deg]
    pub angle_shift: f64,
    pub edges: EdgeFlags,
}

/// Walk out from `(vmpp, impp)` until both edges are touched
///
/// Every reading is appended to `history` as it is taken. `start_time` stamps
/// the synthetic sample representing the previous Mpp.
pub(crate) fn explore<I: InstrumentPort>(
    instrument: &mut I,
    params: &ScanParams,
    vmpp: f64,
    impp: f64,
    start_time: f64,
    history: &mut Vec<Sample>,
) -> Result<ScanOutcome> {
    log::info!("Exploring for new Mpp...");

    let angle_mpp = operating_angle(vmpp, impp, params.voc, params.isc);
    log::debug!("MPP ANGLE = {:0.2}", angle_mpp);

    let mut explored = vec![Sample::new(vmpp, impp, start_time, SampleStatus::default())];
    let mut edges = EdgeFlags::default();
    let mut dv = params.step;
    let mut v_set = vmpp;

    while !edges.bracketed() {
        instrument.set_output(v_set)?;
        let sample = instrument.measure()?;
        history.push(sample);
        explored.push(sample);

        let this_angle =
            operating_angle(sample.voltage, sample.current, params.voc, params.isc);
        let d_angle = angle_mpp - this_angle;

        let angle_edge = if d_angle > params.max_angle_deviation {
            Some(Edge::High)
        } else if d_angle < -params.max_angle_deviation {
            Some(Edge::Low)
        } else {
            None
        };
        // Turn around only on the first touch; repeated exceedance on the same
        // side keeps walking toward the untouched edge
        if let Some(edge) = angle_edge {
            if edges.touch(edge) {
                dv = -dv;
                log::debug!("Reached {} voltage edge because angle exceeded", edge);
            }
        }

        let previous = v_set;
        v_set += dv;
        if let Some((edge, bound)) = params.boundary_edge(v_set, dv) {
            edges.touch(edge);
            dv = -dv;
            // Back to the last commanded setpoint, exactly
            v_set = previous;
            let limit = if bound == 0.0 { "0V" } else { "Voc" };
            log::warn!("Reached {} voltage edge because we hit {}", edge, limit);
        }
    }

    log::info!("Done exploring.");

    let best = which_max_power(&explored)
        .ok_or_else(|| {
            TrackerError::Instrument("exploration produced no readings".to_string())
        })?;
    log::info!(
        "New Mpp found: {:.6} mW @ {:.6} V",
        best.power * 1000.0,
        best.voltage
    );

    let angle_shift =
        angle_mpp - operating_angle(best.voltage, best.current, params.voc, params.isc);
    log::debug!(
        "That's {:.6} degrees different from the previous Mpp.",
        angle_shift
    );

    Ok(ScanOutcome {
        best,
        steps: explored.len() - 1,
        angle_shift,
        edges,
    })
}

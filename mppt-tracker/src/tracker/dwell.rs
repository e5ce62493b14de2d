//! Dwell phase: hold at the freshly found Mpp while sampling

use crate::instrument::{InstrumentPort, SampleCallback};
use crate::types::{Result, Sample, TrackerError};

/// What a completed dwell produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DwellOutcome {
    /// Requested hold time [s]
    pub duration: f64,
    /// Current of the last reading [A]
    pub impp: f64,
    /// Number of readings taken
    pub samples: usize,
}

/// Length of the next dwell: `min(time_left, dwell_time)`
pub(crate) fn dwell_length(time_left: f64, dwell_time: f64) -> f64 {
    time_left.min(dwell_time)
}

/// Hold at `vmpp` for up to `dwell_time` seconds without overrunning `time_left`
///
/// Returns `None` without touching the instrument when there is nothing left
/// to dwell for.
pub(crate) fn dwell<I: InstrumentPort>(
    instrument: &mut I,
    vmpp: f64,
    dwell_time: f64,
    time_left: f64,
    on_sample: Option<SampleCallback<'_>>,
    history: &mut Vec<Sample>,
) -> Result<Option<DwellOutcome>> {
    let duration = dwell_length(time_left, dwell_time);
    if duration <= 0.0 {
        return Ok(None);
    }

    log::info!("Teleporting to Mpp!");
    instrument.set_output(vmpp)?;

    log::info!(
        "Dwelling @ Mpp (V={:0.2}[mV]) for {:0.1} seconds...",
        vmpp * 1000.0,
        duration
    );
    let samples = instrument.measure_until(duration, on_sample)?;
    let impp = samples
        .last()
        .map(|sample| sample.current)
        .ok_or_else(|| TrackerError::Instrument("dwell returned no samples".to_string()))?;

    let outcome = DwellOutcome {
        duration,
        impp,
        samples: samples.len(),
    };
    history.extend(samples);
    Ok(Some(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;
    use crate::config::SenseRange;
    use crate::instrument::{PvCell, SimulatedSourceMeter};

    fn create_meter() -> SimulatedSourceMeter {
        let mut meter = SimulatedSourceMeter::new(SimulatedClock::default(), PvCell::default());
        meter.setup_dc(true, 0.1, 0.3, SenseRange::Auto).unwrap();
        meter
    }

    #[test]
    fn test_dwell_length_is_bounded_by_time_left() {
        assert_eq!(dwell_length(25.0, 10.0), 10.0);
        assert_eq!(dwell_length(3.5, 10.0), 3.5);
        assert_eq!(dwell_length(-1.0, 10.0), -1.0);
    }

    #[test]
    fn test_dwell_holds_and_reports() {
        let mut meter = create_meter();
        let mut history = Vec::new();
        let mut live = Vec::new();
        let mut record = |s: &Sample| live.push(*s);

        let outcome = dwell(&mut meter, 0.5, 10.0, 2.0, Some(&mut record), &mut history)
            .unwrap()
            .unwrap();

        assert_eq!(outcome.duration, 2.0);
        assert_eq!(outcome.samples, history.len());
        assert_eq!(outcome.impp, history.last().unwrap().current);
        assert_eq!(live, history);
        assert_eq!(meter.stats().burst_durations, vec![2.0]);
        assert_eq!(meter.setpoint(), 0.5);
    }

    #[test]
    fn test_no_time_left_skips_instrument() {
        let mut meter = create_meter();
        let calls_before = meter.stats().total_calls();
        let mut history = Vec::new();

        let outcome = dwell(&mut meter, 0.5, 10.0, 0.0, None, &mut history).unwrap();
        assert!(outcome.is_none());

        let outcome = dwell(&mut meter, 0.5, 10.0, -0.4, None, &mut history).unwrap();
        assert!(outcome.is_none());

        assert!(history.is_empty());
        assert_eq!(meter.stats().total_calls(), calls_before);
    }
}

//! Simulated source-measure unit
//!
//! Sources a voltage onto a [`PvCell`] and reports the resulting current. Every
//! operation advances a shared [`SimulatedClock`] by the time real hardware
//! would take, so the tracker's duration checks behave as they do on a bench.
//! The meter also records what it was asked to do, which tests use to check
//! the tracker's behaviour.

use super::pv_model::{Illumination, PvCell};
use super::{InstrumentPort, SampleCallback};
use crate::clock::{Clock, SimulatedClock};
use crate::config::SenseRange;
use crate::types::{Result, Sample, SampleStatus, TrackerError};
use serde::{Deserialize, Serialize};

/// Timing model of a single reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementTiming {
    /// Mains frequency used to turn NPLC into seconds [Hz]
    #[serde(default = "default_line_frequency")]
    pub line_frequency: f64,
    /// Integration time in power-line cycles
    #[serde(default = "default_nplc")]
    pub nplc: f64,
    /// Fixed per-reading overhead (trigger, transfer) [s]
    #[serde(default = "default_overhead")]
    pub overhead: f64,
    /// Time for a setpoint change to take effect [s]
    #[serde(default)]
    pub settle_time: f64,
}

fn default_line_frequency() -> f64 {
    50.0
}

fn default_nplc() -> f64 {
    1.0
}

fn default_overhead() -> f64 {
    0.01
}

impl Default for MeasurementTiming {
    fn default() -> Self {
        Self {
            line_frequency: default_line_frequency(),
            nplc: default_nplc(),
            overhead: default_overhead(),
            settle_time: 0.0,
        }
    }
}

impl MeasurementTiming {
    /// Seconds consumed by one reading
    pub fn reading_period(&self) -> f64 {
        self.nplc / self.line_frequency + self.overhead
    }
}

/// Counters of the operations the meter has performed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentStats {
    pub setups: usize,
    pub trigger_arms: usize,
    pub setpoint_changes: usize,
    pub measurements: usize,
    pub bursts: usize,
    pub nplc_changes: usize,
    /// Requested duration of every `measure_until` call, in order
    pub burst_durations: Vec<f64>,
    /// Every voltage the output was set to (setup and `set_output`), in order
    pub setpoints: Vec<f64>,
    /// Compliance passed to each `setup_dc`
    pub compliances: Vec<f64>,
}

impl InstrumentStats {
    /// Total number of instrument operations
    pub fn total_calls(&self) -> usize {
        self.setups
            + self.trigger_arms
            + self.setpoint_changes
            + self.measurements
            + self.bursts
            + self.nplc_changes
    }
}

/// Source meter connected to a simulated photovoltaic cell
#[derive(Debug, Clone)]
pub struct SimulatedSourceMeter {
    clock: SimulatedClock,
    cell: PvCell,
    illumination: Illumination,
    timing: MeasurementTiming,
    setpoint: f64,
    compliance: f64,
    configured: bool,
    stats: InstrumentStats,
    fail_after: Option<usize>,
}

impl SimulatedSourceMeter {
    /// Create a meter driving `cell` under constant nominal illumination
    pub fn new(clock: SimulatedClock, cell: PvCell) -> Self {
        Self {
            clock,
            cell,
            illumination: Illumination::default(),
            timing: MeasurementTiming::default(),
            setpoint: 0.0,
            compliance: f64::INFINITY,
            configured: false,
            stats: InstrumentStats::default(),
            fail_after: None,
        }
    }

    /// Builder method: set the illumination profile
    pub fn with_illumination(mut self, illumination: Illumination) -> Self {
        self.illumination = illumination;
        self
    }

    /// Builder method: set the timing model
    pub fn with_timing(mut self, timing: MeasurementTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Builder method: fail every operation after `operations` successful ones
    pub fn with_fault_after(mut self, operations: usize) -> Self {
        self.fail_after = Some(operations);
        self
    }

    /// Replace the illumination profile mid-session
    pub fn set_illumination(&mut self, illumination: Illumination) {
        self.illumination = illumination;
    }

    /// Operations performed so far
    pub fn stats(&self) -> &InstrumentStats {
        &self.stats
    }

    /// The clock this meter advances
    pub fn clock(&self) -> &SimulatedClock {
        &self.clock
    }

    /// Current voltage setpoint
    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    fn check_fault(&self) -> Result<()> {
        match self.fail_after {
            Some(limit) if self.stats.total_calls() >= limit => Err(TrackerError::Instrument(
                format!("simulated fault after {} operations", limit),
            )),
            _ => Ok(()),
        }
    }

    fn read(&mut self) -> Result<Sample> {
        if !self.configured {
            return Err(TrackerError::Instrument(
                "measurement requested before DC setup".to_string(),
            ));
        }

        self.clock.advance(self.timing.reading_period());
        let timestamp = self.clock.now();
        let level = self.illumination.at(timestamp);
        let raw = self.cell.current_at(self.setpoint, level);

        let mut status = SampleStatus::default();
        let current = if raw.abs() > self.compliance {
            status.0 |= SampleStatus::IN_COMPLIANCE;
            self.compliance.copysign(raw)
        } else {
            raw
        };

        Ok(Sample::new(self.setpoint, current, timestamp, status))
    }
}

impl InstrumentPort for SimulatedSourceMeter {
    fn setup_dc(
        &mut self,
        source_voltage: bool,
        compliance: f64,
        set_point: f64,
        _sense_range: SenseRange,
    ) -> Result<()> {
        self.check_fault()?;
        if !source_voltage {
            return Err(TrackerError::Instrument(
                "simulated meter only supports voltage sourcing".to_string(),
            ));
        }
        self.stats.setups += 1;
        self.stats.compliances.push(compliance);
        self.stats.setpoints.push(set_point);

        self.compliance = compliance.abs();
        self.setpoint = set_point;
        self.configured = true;
        self.clock.advance(self.timing.settle_time);
        Ok(())
    }

    fn arm_immediate_trigger(&mut self) -> Result<()> {
        self.check_fault()?;
        self.stats.trigger_arms += 1;
        Ok(())
    }

    fn set_output(&mut self, voltage: f64) -> Result<()> {
        self.check_fault()?;
        self.stats.setpoint_changes += 1;
        self.stats.setpoints.push(voltage);

        self.setpoint = voltage;
        self.clock.advance(self.timing.settle_time);
        Ok(())
    }

    fn measure(&mut self) -> Result<Sample> {
        self.check_fault()?;
        self.stats.measurements += 1;
        self.read()
    }

    fn measure_until(
        &mut self,
        duration: f64,
        mut on_sample: Option<SampleCallback<'_>>,
    ) -> Result<Vec<Sample>> {
        self.check_fault()?;
        self.stats.bursts += 1;
        self.stats.burst_durations.push(duration);

        let start = self.clock.now();
        let mut samples = Vec::new();
        // At least one reading, then keep going until the window is used up
        loop {
            let sample = self.read()?;
            if let Some(callback) = on_sample.as_deref_mut() {
                callback(&sample);
            }
            samples.push(sample);
            if self.clock.now() - start >= duration {
                break;
            }
        }
        Ok(samples)
    }

    fn set_nplc(&mut self, nplc: f64) -> Result<()> {
        self.check_fault()?;
        if !(nplc.is_finite() && nplc > 0.0) {
            return Err(TrackerError::Instrument(format!("invalid NPLC {}", nplc)));
        }
        self.stats.nplc_changes += 1;
        self.timing.nplc = nplc;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_meter() -> SimulatedSourceMeter {
        SimulatedSourceMeter::new(SimulatedClock::default(), PvCell::default())
    }

    #[test]
    fn test_measure_requires_setup() {
        let mut meter = create_meter();
        assert!(matches!(meter.measure(), Err(TrackerError::Instrument(_))));
    }

    #[test]
    fn test_measure_advances_clock() {
        let mut meter = create_meter();
        meter.setup_dc(true, 0.1, 0.3, SenseRange::Auto).unwrap();

        let sample = meter.measure().unwrap();
        assert!((sample.timestamp - 0.03).abs() < 1e-12);
        assert_eq!(sample.voltage, 0.3);
        assert!(sample.current < 0.0);
        assert!((meter.clock().now() - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_burst_covers_duration_and_calls_back() {
        let mut meter = create_meter();
        meter.setup_dc(true, 0.1, 0.5, SenseRange::Auto).unwrap();

        let mut seen = 0;
        let mut count = |_: &Sample| seen += 1;
        let samples = meter.measure_until(1.0, Some(&mut count)).unwrap();

        assert_eq!(seen, samples.len());
        assert!(meter.clock().now() >= 1.0);
        assert!(samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(meter.stats().burst_durations, vec![1.0]);
    }

    #[test]
    fn test_zero_length_burst_still_reads_once() {
        let mut meter = create_meter();
        meter.setup_dc(true, 0.1, 0.5, SenseRange::Auto).unwrap();

        let samples = meter.measure_until(0.0, None).unwrap();
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_compliance_clamps_current() {
        let mut meter = create_meter();
        meter.setup_dc(true, 0.01, 0.0, SenseRange::Auto).unwrap();

        let sample = meter.measure().unwrap();
        assert_eq!(sample.current, -0.01);
        assert!(sample.status.has(SampleStatus::IN_COMPLIANCE));
    }

    #[test]
    fn test_nplc_changes_reading_period() {
        let mut meter = create_meter();
        meter.set_nplc(5.0).unwrap();
        meter.setup_dc(true, 0.1, 0.3, SenseRange::Auto).unwrap();

        let sample = meter.measure().unwrap();
        assert!((sample.timestamp - 0.11).abs() < 1e-12);
        assert!(meter.set_nplc(0.0).is_err());
    }

    #[test]
    fn test_fault_injection() {
        let mut meter = create_meter().with_fault_after(2);
        meter.setup_dc(true, 0.1, 0.3, SenseRange::Auto).unwrap();
        meter.set_output(0.4).unwrap();

        assert!(matches!(meter.measure(), Err(TrackerError::Instrument(_))));
        assert_eq!(meter.stats().setpoints, vec![0.3, 0.4]);
    }
}

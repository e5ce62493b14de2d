//! Tracking loop
//!
//! `Tracker` is the entry point of the library. It owns the instrument and the
//! clock for the duration of a run and drives the state machine:
//!
//! ```text
//! NotStarted -> InitialSoak -> { Exploring <-> Dwelling } -> Done
//! NotStarted -> Done                      (Voc unknown)
//! ```
//!
//! The time budget is only checked between phases. A scan that is already
//! running always finishes, even if that overruns the requested duration.

use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::instrument::{InstrumentPort, SampleCallback};
use crate::state::TrackerState;
use crate::types::{Result, Sample, TrackerError, TrackerPhase};

mod acquisition;
mod dwell;
mod scan;

pub use dwell::DwellOutcome;
pub use scan::{Edge, EdgeFlags, ScanOutcome};

use scan::ScanParams;

/// Maximum power point tracker bound to one instrument
pub struct Tracker<I, C> {
    instrument: I,
    clock: C,
    config: TrackerConfig,
}

impl<I, C> Tracker<I, C>
where
    I: InstrumentPort,
    C: Clock,
{
    /// Create a tracker with the default configuration
    pub fn new(instrument: I, clock: C) -> Self {
        Self {
            instrument,
            clock,
            config: TrackerConfig::default(),
        }
    }

    /// Builder method: replace the configuration
    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The instrument being driven
    pub fn instrument(&self) -> &I {
        &self.instrument
    }

    /// Mutable access to the instrument between runs
    pub fn instrument_mut(&mut self) -> &mut I {
        &mut self.instrument
    }

    /// Track the maximum power point for `total_duration` seconds
    ///
    /// Seeds whatever `state` is missing, soaks at the estimated Mpp, then
    /// alternates exploration scans and dwells until the time budget is used.
    /// `callback` is invoked synchronously for every dwell reading. `nplc`, if
    /// given, is applied once before the instrument is set up.
    ///
    /// Returns every reading in acquisition order. If Voc is not known the run
    /// is skipped with a warning and an empty history is returned. Instrument
    /// failures are propagated as they are; `state` then holds the last
    /// completed estimate.
    ///
    /// # Example
    /// ```
    /// use mppt_tracker::{PvCell, SimulatedClock, SimulatedSourceMeter, Tracker, TrackerState};
    ///
    /// let clock = SimulatedClock::default();
    /// let meter = SimulatedSourceMeter::new(clock.clone(), PvCell::default());
    /// let mut tracker = Tracker::new(meter, clock);
    ///
    /// let mut state = TrackerState::new().with_voc(0.66);
    /// let samples = tracker.launch_tracker(&mut state, 30.0, None, None).unwrap();
    ///
    /// assert!(!samples.is_empty());
    /// assert!(state.vmpp.is_some());
    /// ```
    pub fn launch_tracker(
        &mut self,
        state: &mut TrackerState,
        total_duration: f64,
        mut callback: Option<SampleCallback<'_>>,
        nplc: Option<f64>,
    ) -> Result<Vec<Sample>> {
        let voc = match state.require_voc() {
            Ok(voc) => voc,
            Err(TrackerError::VocUnknown) => {
                log::warn!("Not doing power point tracking. Voc not known.");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        self.config.validate()?;
        state.validate()?;
        if !total_duration.is_finite() {
            return Err(TrackerError::InvalidConfig(format!(
                "tracking duration must be finite, got {}",
                total_duration
            )));
        }

        let t0 = self.clock.now();
        state.t0 = Some(t0);

        if let Some(nplc) = nplc {
            self.instrument.set_nplc(nplc)?;
        }

        let mut history = Vec::new();
        let mut cycles = 0usize;
        let mut phase = TrackerPhase::NotStarted;
        log::debug!("Tracker phase: {}", phase);

        loop {
            let next = match phase {
                TrackerPhase::NotStarted => TrackerPhase::InitialSoak,
                TrackerPhase::InitialSoak => {
                    acquisition::initial_acquisition(
                        &mut self.instrument,
                        &self.config,
                        state,
                        total_duration,
                        &mut history,
                    )?;
                    log::info!("===Starting up maximum power point tracking===");
                    self.continue_or_finish(t0, total_duration, TrackerPhase::Exploring)
                }
                TrackerPhase::Exploring => {
                    let (vmpp, impp, isc) = current_estimate(state)?;
                    let params = ScanParams::new(voc, isc, &self.config);
                    let outcome = scan::explore(
                        &mut self.instrument,
                        &params,
                        vmpp,
                        impp,
                        self.clock.now(),
                        &mut history,
                    )?;
                    state.vmpp = Some(state.clamp_to_operating_range(outcome.best.voltage)?);
                    state.impp = Some(outcome.best.current);
                    cycles += 1;
                    self.continue_or_finish(t0, total_duration, TrackerPhase::Dwelling)
                }
                TrackerPhase::Dwelling => {
                    let (vmpp, _, _) = current_estimate(state)?;
                    let time_left = total_duration - (self.clock.now() - t0);
                    let on_sample = callback
                        .as_mut()
                        .map(|cb| &mut **cb as &mut dyn FnMut(&Sample));
                    if let Some(outcome) = dwell::dwell(
                        &mut self.instrument,
                        vmpp,
                        state.dwell_time,
                        time_left,
                        on_sample,
                        &mut history,
                    )? {
                        state.impp = Some(outcome.impp);
                    }
                    self.continue_or_finish(t0, total_duration, TrackerPhase::Exploring)
                }
                TrackerPhase::Done => break,
            };
            if next != phase {
                log::debug!("Tracker phase: {} -> {}", phase, next);
            }
            phase = next;
        }

        let run_time = self.clock.now() - t0;
        log::info!(
            "Final value seen by the max power point tracker after running for {:.1} seconds \
             ({} cycles) is",
            run_time,
            cycles
        );
        if let (Some(vmpp), Some(impp)) = (state.vmpp, state.impp) {
            log::info!(
                "{:0.4} mW @ {:0.2} mV and {:0.2} mA",
                -(vmpp * impp) * 1000.0,
                vmpp * 1000.0,
                impp * 1000.0
            );
        }

        Ok(history)
    }

    /// `next` while there is time left, otherwise `Done`
    fn continue_or_finish(
        &self,
        t0: f64,
        total_duration: f64,
        next: TrackerPhase,
    ) -> TrackerPhase {
        if self.clock.now() - t0 >= total_duration {
            TrackerPhase::Done
        } else {
            next
        }
    }
}

/// `(Vmpp, Impp, Isc)` after the initial soak has filled them in
fn current_estimate(state: &TrackerState) -> Result<(f64, f64, f64)> {
    match (state.vmpp, state.impp, state.isc) {
        (Some(vmpp), Some(impp), Some(isc)) => Ok((vmpp, impp, isc)),
        _ => Err(TrackerError::InvalidState(
            "Mpp estimate missing after initial soak".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;
    use crate::instrument::{Illumination, PvCell, SimulatedSourceMeter};

    fn create_tracker() -> Tracker<SimulatedSourceMeter, SimulatedClock> {
        let clock = SimulatedClock::default();
        let meter = SimulatedSourceMeter::new(clock.clone(), PvCell::default());
        Tracker::new(meter, clock)
    }

    #[test]
    fn test_unknown_voc_is_a_no_op() {
        let mut tracker = create_tracker();
        let mut state = TrackerState::new();

        let samples = tracker
            .launch_tracker(&mut state, 30.0, None, Some(1.0))
            .unwrap();

        assert!(samples.is_empty());
        assert_eq!(tracker.instrument().stats().total_calls(), 0);
        assert_eq!(state, TrackerState::new());
    }

    #[test]
    fn test_run_respects_time_budget_and_order() {
        let mut tracker = create_tracker();
        let voc = PvCell::default().open_circuit_voltage(1.0);
        let mut state = TrackerState::new().with_voc(voc);

        let samples = tracker
            .launch_tracker(&mut state, 45.0, None, None)
            .unwrap();

        let stats = tracker.instrument().stats();
        // Soak, then dwells of at most 10 s that never exceed the remaining time
        assert_eq!(stats.burst_durations[0], 10.0);
        assert!(stats.burst_durations[1..].iter().all(|&d| d > 0.0 && d <= 10.0));
        assert!(samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

        let elapsed = tracker.clock.now() - state.t0.unwrap();
        assert!(elapsed >= 45.0);
        assert_eq!(state.t0, Some(0.0));
    }

    #[test]
    fn test_nplc_is_applied_once() {
        let mut tracker = create_tracker();
        let mut state = TrackerState::new().with_voc(0.65);

        tracker
            .launch_tracker(&mut state, 20.0, None, Some(2.0))
            .unwrap();
        assert_eq!(tracker.instrument().stats().nplc_changes, 1);
    }

    #[test]
    fn test_callback_sees_every_dwell_sample() {
        let mut tracker = create_tracker();
        let mut state = TrackerState::new().with_voc(0.65).with_dwell_time(3.0);
        let mut seen = 0usize;
        let mut count = |_: &Sample| seen += 1;

        let samples = tracker
            .launch_tracker(&mut state, 20.0, Some(&mut count), None)
            .unwrap();

        let stats = tracker.instrument().stats();
        // 10 s soak at 0.03 s per reading; everything that is neither a soak
        // reading nor a scan reading came from a dwell
        let soak = (10.0_f64 / 0.03).ceil() as usize;
        assert!(seen > 0);
        assert_eq!(seen, samples.len() - soak - stats.measurements);
    }

    #[test]
    fn test_instrument_error_propagates() {
        let clock = SimulatedClock::default();
        let meter =
            SimulatedSourceMeter::new(clock.clone(), PvCell::default()).with_fault_after(50);
        let mut tracker = Tracker::new(meter, clock);
        let mut state = TrackerState::new().with_voc(0.65);

        let result = tracker.launch_tracker(&mut state, 60.0, None, None);
        assert!(matches!(result, Err(TrackerError::Instrument(_))));
        // The soak completed before the fault, so its estimate is kept
        assert!(state.impp.is_some());
    }

    #[test]
    fn test_invalid_inputs_are_rejected() {
        let mut tracker = create_tracker();

        let mut state = TrackerState::new().with_voc(0.0);
        assert!(matches!(
            tracker.launch_tracker(&mut state, 10.0, None, None),
            Err(TrackerError::InvalidState(_))
        ));

        let mut state = TrackerState::new().with_voc(0.6);
        assert!(tracker.launch_tracker(&mut state, f64::NAN, None, None).is_err());

        let mut tracker =
            create_tracker().with_config(TrackerConfig::new().with_step_divisions(0));
        assert!(matches!(
            tracker.launch_tracker(&mut state, 10.0, None, None),
            Err(TrackerError::InvalidConfig(_))
        ));
        assert_eq!(tracker.instrument().stats().total_calls(), 0);
    }

    #[test]
    fn test_follows_illumination_step() {
        let clock = SimulatedClock::default();
        let cell = PvCell::default();
        let meter = SimulatedSourceMeter::new(clock.clone(), cell).with_illumination(
            Illumination::Step {
                before: 1.0,
                after: 0.4,
                at: 40.0,
            },
        );
        let mut tracker = Tracker::new(meter, clock);
        let mut state = TrackerState::new().with_voc(cell.open_circuit_voltage(1.0));

        tracker
            .launch_tracker(&mut state, 120.0, None, None)
            .unwrap();

        let (_, _, dim_pmax) = cell.max_power_point(0.4);
        let power = state.mpp_power().unwrap();
        assert!(power > 0.97 * dim_pmax, "{} vs {}", power, dim_pmax);
    }
}

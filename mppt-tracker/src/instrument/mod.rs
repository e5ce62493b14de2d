//! Instrument abstraction (source-measure unit)
//!
//! The tracker never talks to hardware directly. It drives anything that
//! implements [`InstrumentPort`]; drivers map their own failures into
//! [`TrackerError::Instrument`](crate::TrackerError::Instrument).
//!
//! A simulated source meter backed by a photovoltaic cell model is provided for
//! tests and dry runs.

use crate::config::SenseRange;
use crate::types::{Result, Sample};

pub mod pv_model;
pub mod simulated;

// Re-export simulation types
pub use pv_model::{Illumination, PvCell};
pub use simulated::{InstrumentStats, MeasurementTiming, SimulatedSourceMeter};

/// Per-sample callback invoked synchronously during a timed burst
pub type SampleCallback<'a> = &'a mut dyn FnMut(&Sample);

/// Capabilities the tracker needs from a source-measure instrument
///
/// All operations block until the instrument has done the work; the tracking
/// algorithm relies on that time actually passing.
pub trait InstrumentPort {
    /// Configure source mode, compliance, initial setpoint and sense range
    fn setup_dc(
        &mut self,
        source_voltage: bool,
        compliance: f64,
        set_point: f64,
        sense_range: SenseRange,
    ) -> Result<()>;

    /// Prepare the immediate trigger mode used by subsequent reads
    fn arm_immediate_trigger(&mut self) -> Result<()>;

    /// Change the voltage setpoint
    fn set_output(&mut self, voltage: f64) -> Result<()>;

    /// Take one reading now
    fn measure(&mut self) -> Result<Sample>;

    /// Read continuously for `duration` seconds
    ///
    /// Calls `on_sample` once per reading as it arrives and returns every
    /// reading in acquisition order.
    fn measure_until(
        &mut self,
        duration: f64,
        on_sample: Option<SampleCallback<'_>>,
    ) -> Result<Vec<Sample>>;

    /// Set the integration time in power-line cycles
    fn set_nplc(&mut self, nplc: f64) -> Result<()>;
}

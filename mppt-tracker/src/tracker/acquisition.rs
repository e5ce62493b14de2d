//! Initial acquisition: teleport to the estimated Mpp and soak there
//!
//! Fills in whatever the caller did not seed (Vmpp, compliance, Isc) so the
//! exploration scan has a complete starting estimate.

use crate::config::TrackerConfig;
use crate::instrument::InstrumentPort;
use crate::state::TrackerState;
use crate::types::{Result, Sample, TrackerError};

/// Run the initial soak and append its readings to `history`
///
/// Returns the soak length that was requested from the instrument [s].
pub(crate) fn initial_acquisition<I: InstrumentPort>(
    instrument: &mut I,
    config: &TrackerConfig,
    state: &mut TrackerState,
    total_duration: f64,
    history: &mut Vec<Sample>,
) -> Result<f64> {
    let voc = state.require_voc()?;

    let vmpp = match state.vmpp {
        Some(seed) => {
            let clamped = state.clamp_to_operating_range(seed)?;
            if clamped != seed {
                log::warn!(
                    "Seed Vmpp {:.4} V lies outside [0, Voc]; using {:.4} V",
                    seed,
                    clamped
                );
            }
            clamped
        }
        None => config.initial_vmpp_fraction * voc,
    };
    state.vmpp = Some(vmpp);

    // Only used for the soak until a measured value can replace it
    let compliance = state
        .current_compliance
        .unwrap_or(config.provisional_compliance);

    log::info!("Teleporting to Mpp!");
    instrument.setup_dc(true, compliance, vmpp, config.sense_range)?;
    instrument.arm_immediate_trigger()?;

    let soak = config.initial_soak_duration(total_duration);
    log::info!(
        "Soaking @ Mpp (V={:0.2}[mV]) for {:0.1} seconds...",
        vmpp * 1000.0,
        soak
    );
    let samples = instrument.measure_until(soak, None)?;

    let impp = samples
        .last()
        .map(|sample| sample.current)
        .ok_or_else(|| {
            TrackerError::Instrument("initial soak returned no samples".to_string())
        })?;
    state.impp = Some(impp);

    if state.current_compliance.is_none() {
        let committed = (impp * config.compliance_headroom).abs();
        log::debug!("Committing compliance {:.6} A", committed);
        state.current_compliance = Some(committed);
    }
    if state.isc.is_none() {
        let estimate = impp * config.isc_over_impp;
        log::debug!("Estimating Isc as {:.6} A", estimate);
        state.isc = Some(estimate);
    }

    history.extend(samples);
    Ok(soak)
}

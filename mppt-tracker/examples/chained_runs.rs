// Chain tracking runs across an illumination change
//
// Run with: cargo run --example chained_runs -p mppt-tracker
// Set RUST_LOG=debug to see the scan bookkeeping.

use mppt_tracker::{
    Illumination, PvCell, Sample, SimulatedClock, SimulatedSourceMeter, Tracker, TrackerState,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let clock = SimulatedClock::default();
    let cell = PvCell::default();
    let meter = SimulatedSourceMeter::new(clock.clone(), cell);
    let mut tracker = Tracker::new(meter, clock);

    let mut state = TrackerState::new().with_voc(cell.open_circuit_voltage(1.0));

    for (run, level) in [1.0, 0.6, 0.25, 0.8].into_iter().enumerate() {
        tracker
            .instrument_mut()
            .set_illumination(Illumination::Constant { level });

        let mut readings = 0usize;
        let mut count = |_: &Sample| readings += 1;
        let samples = match tracker.launch_tracker(&mut state, 40.0, Some(&mut count), None) {
            Ok(samples) => samples,
            Err(e) => {
                eprintln!("Run {} failed: {}", run + 1, e);
                return;
            }
        };

        let (true_v, _, true_p) = cell.max_power_point(level);
        println!(
            "run {} @ {:.2} sun: {} readings ({} live), \
             Vmpp {:.4} V (true {:.4} V), P {:.3} mW (true {:.3} mW)",
            run + 1,
            level,
            samples.len(),
            readings,
            state.vmpp.unwrap_or(f64::NAN),
            true_v,
            state.mpp_power().unwrap_or(f64::NAN) * 1000.0,
            true_p * 1000.0
        );
    }
}

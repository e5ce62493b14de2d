//! MPPT Tracker CLI Application
//!
//! Command-line front end for the mppt-tracker library. It runs the tracker
//! against the simulated source meter and adds:
//! - TOML configuration of the tracker, the bench and the run
//! - Tracker state persistence between runs
//! - Live progress reporting
//! - JSON/CSV export of every reading

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use mppt_tracker::{Sample, SimulatedClock, SimulatedSourceMeter, Tracker, TrackerState};
use std::path::{Path, PathBuf};

mod callbacks;
mod config;
mod report;
mod state;

use config::{AppConfig, OutputFormat};

/// MPPT Tracker - Track the maximum power point of a simulated solar cell
#[derive(Parser, Debug)]
#[command(name = "mppt-cli")]
#[command(about = "Track the maximum power point of a (simulated) PV device", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Tracking time budget in seconds
    #[arg(short, long, value_name = "SECONDS")]
    duration: Option<f64>,

    /// Open-circuit voltage of the device [V]
    #[arg(long, value_name = "VOLTS", allow_negative_numbers = true)]
    voc: Option<f64>,

    /// Short-circuit current estimate [A]
    #[arg(long, value_name = "AMPS", allow_negative_numbers = true)]
    isc: Option<f64>,

    /// Initial guess for the max power point voltage [V]
    #[arg(long, value_name = "VOLTS", allow_negative_numbers = true)]
    vmpp: Option<f64>,

    /// Seconds to hold at each newly found Mpp
    #[arg(long, value_name = "SECONDS")]
    dwell_time: Option<f64>,

    /// Integration time in power-line cycles
    #[arg(long, value_name = "CYCLES")]
    nplc: Option<f64>,

    /// Tracker state file (loaded before the run, saved after it)
    #[arg(short, long, value_name = "FILE")]
    state: Option<PathBuf>,

    /// Output file for the readings (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Derive Voc from the simulated cell when it is not known
    #[arg(long)]
    auto_voc: bool,

    /// Log every Nth dwell reading (0 = never)
    #[arg(long, value_name = "N")]
    report_every: Option<usize>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("MPPT Tracker CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using tracker library v{}", mppt_tracker::VERSION);

    let config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    run(&args, config)
}

/// Resolve the starting state: CLI flag > state file > TOML `[state]`
fn resolve_state(
    args: &Args,
    config: &AppConfig,
    state_file: Option<&Path>,
) -> Result<TrackerState> {
    let mut tracker_state = match state_file {
        Some(path) => match state::load_state(path)? {
            Some(saved) => {
                log::info!("Resuming from saved tracker state {:?}", path);
                saved
            }
            None => config.state.clone(),
        },
        None => config.state.clone(),
    };

    if let Some(voc) = args.voc {
        tracker_state.voc = Some(voc);
    }
    if let Some(isc) = args.isc {
        tracker_state.isc = Some(isc);
    }
    if let Some(vmpp) = args.vmpp {
        tracker_state.vmpp = Some(vmpp);
    }
    if let Some(dwell_time) = args.dwell_time {
        tracker_state.dwell_time = dwell_time;
    }

    if tracker_state.voc.is_none() && (args.auto_voc || config.simulation.auto_voc) {
        let level = config.simulation.illumination.at(0.0);
        let voc = config.simulation.cell.open_circuit_voltage(level);
        log::info!("Voc derived from the cell model: {:.2} mV", voc * 1000.0);
        tracker_state.voc = Some(voc);
    }

    Ok(tracker_state)
}

fn run(args: &Args, config: AppConfig) -> Result<()> {
    let state_file = args.state.as_ref().or(config.run.state_file.as_ref()).cloned();
    let output = args.output.as_ref().or(config.run.output.as_ref()).cloned();
    let format = args.format.unwrap_or(config.run.format);
    let duration = args.duration.unwrap_or(config.run.duration);
    let nplc = args.nplc.or(config.run.nplc);
    let report_every = args.report_every.unwrap_or(config.run.report_every);

    let mut tracker_state = resolve_state(args, &config, state_file.as_deref())?;

    let clock = SimulatedClock::default();
    let meter = SimulatedSourceMeter::new(clock.clone(), config.simulation.cell)
        .with_illumination(config.simulation.illumination)
        .with_timing(config.simulation.timing);
    let mut tracker = Tracker::new(meter, clock).with_config(config.tracker.clone());

    let mut reporter = callbacks::LiveReporter::new(report_every);
    let mut on_sample = |sample: &Sample| reporter.on_sample(sample);
    let samples = tracker
        .launch_tracker(&mut tracker_state, duration, Some(&mut on_sample), nplc)
        .context("Tracking run failed")?;
    log::debug!(
        "{} dwell readings, {:.6} J harvested while dwelling",
        reporter.seen(),
        reporter.energy()
    );

    let summary = report::RunSummary::from_run(&samples, &tracker_state);
    let run_report = report::RunReport {
        generated_at: Utc::now(),
        summary: &summary,
        state: &tracker_state,
        samples: &samples,
    };

    match &output {
        Some(path) => {
            if !args.quiet {
                summary.print();
            }
            report::write_report(Some(path), format, &run_report)?;
        }
        None => {
            // Readings own stdout; the summary goes to the log
            log::info!(
                "{} readings over {:.1} s, mean power {:.4} mW",
                summary.samples,
                summary.elapsed,
                summary.mean_power * 1000.0
            );
            report::write_report(None, format, &run_report)?;
        }
    }

    if let Some(path) = &state_file {
        state::save_state(path, &tracker_state)?;
    }

    Ok(())
}

/// Level for the tracker crates; `-q` wins over `-v`
fn log_level(verbose: u8, quiet: bool) -> log::LevelFilter {
    use log::LevelFilter;

    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initialize logging: tracker crates at the chosen level, everything else at warn
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = log_level(verbose, quiet);

    Builder::new()
        .filter_level(LevelFilter::Warn.min(level))
        .filter_module("mppt_tracker", level)
        .filter_module("mppt_cli", level)
        .format(|buf, record| {
            // mppt_tracker::tracker::scan -> tracker::scan
            let target = record
                .target()
                .strip_prefix("mppt_tracker::")
                .unwrap_or(record.target());
            writeln!(buf, "[{:<5} {}] {}", record.level(), target, record.args())
        })
        .init();
}

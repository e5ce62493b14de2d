//! Run summary and sample export
//!
//! Samples are written either as a single JSON document (summary, final state
//! and every reading) or as a flat CSV table of readings.

use crate::config::OutputFormat;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mppt_tracker::{Sample, TrackerState};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Headline numbers of one tracking run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub samples: usize,
    /// Time from the first to the last reading [s]
    pub elapsed: f64,
    pub vmpp: Option<f64>,
    pub impp: Option<f64>,
    /// Power at the final Mpp estimate [W]
    pub mpp_power: Option<f64>,
    /// Mean generated power over all readings [W]
    pub mean_power: f64,
    /// Readings that hit the compliance limit
    pub in_compliance: usize,
}

impl RunSummary {
    pub fn from_run(samples: &[Sample], state: &TrackerState) -> Self {
        let elapsed = match (samples.first(), samples.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        };
        let mean_power = if samples.is_empty() {
            0.0
        } else {
            samples.iter().map(Sample::power).sum::<f64>() / samples.len() as f64
        };

        Self {
            samples: samples.len(),
            elapsed,
            vmpp: state.vmpp,
            impp: state.impp,
            mpp_power: state.mpp_power(),
            mean_power,
            in_compliance: samples
                .iter()
                .filter(|s| s.status.has(mppt_tracker::SampleStatus::IN_COMPLIANCE))
                .count(),
        }
    }

    /// Print the summary to stdout
    pub fn print(&self) {
        println!("═══════════════════════════════════════════════");
        println!("  MPPT Run Summary");
        println!("═══════════════════════════════════════════════");
        println!("  Readings:      {}", self.samples);
        println!("  Elapsed:       {:.1} s", self.elapsed);
        match (self.vmpp, self.impp, self.mpp_power) {
            (Some(v), Some(i), Some(p)) => {
                println!("  Vmpp:          {:.2} mV", v * 1000.0);
                println!("  Impp:          {:.3} mA", i * 1000.0);
                println!("  Pmpp:          {:.4} mW", p * 1000.0);
            }
            _ => println!("  Mpp:           not found"),
        }
        println!("  Mean power:    {:.4} mW", self.mean_power * 1000.0);
        if self.in_compliance > 0 {
            println!("  In compliance: {}", self.in_compliance);
        }
    }
}

/// Everything written by the JSON exporter
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub summary: &'a RunSummary,
    pub state: &'a TrackerState,
    pub samples: &'a [Sample],
}

/// Write the run to `path`, or stdout when no path is given
pub fn write_report(
    path: Option<&Path>,
    format: OutputFormat,
    report: &RunReport<'_>,
) -> Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            let mut writer = BufWriter::new(file);
            write_to(&mut writer, format, report)?;
            writer.flush()?;
            log::info!("Wrote {} readings to {:?}", report.samples.len(), path);
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_to(&mut writer, format, report)?;
        }
    }
    Ok(())
}

fn write_to<W: Write>(
    writer: &mut W,
    format: OutputFormat,
    report: &RunReport<'_>,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, report)
                .context("Failed to serialize run report")?;
            writeln!(writer)?;
        }
        OutputFormat::Csv => write_csv(writer, report.samples)?,
    }
    Ok(())
}

/// One row per reading
pub fn write_csv<W: Write>(writer: &mut W, samples: &[Sample]) -> io::Result<()> {
    writeln!(writer, "timestamp,voltage,current,power,status")?;
    for sample in samples {
        writeln!(
            writer,
            "{},{},{},{},{}",
            sample.timestamp,
            sample.voltage,
            sample.current,
            sample.power(),
            sample.status.0
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mppt_tracker::SampleStatus;

    fn create_samples() -> Vec<Sample> {
        vec![
            Sample::new(0.5, -0.02, 1.0, SampleStatus::default()),
            Sample::new(0.5, -0.03, 2.0, SampleStatus(SampleStatus::IN_COMPLIANCE)),
            Sample::new(0.5, -0.01, 4.0, SampleStatus::default()),
        ]
    }

    #[test]
    fn test_summary_from_run() {
        let samples = create_samples();
        let mut state = TrackerState::new().with_voc(0.6).with_vmpp(0.5);
        state.impp = Some(-0.01);

        let summary = RunSummary::from_run(&samples, &state);
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.elapsed, 3.0);
        assert!((summary.mean_power - 0.01).abs() < 1e-12);
        assert!((summary.mpp_power.unwrap() - 0.005).abs() < 1e-12);
        assert_eq!(summary.in_compliance, 1);
    }

    #[test]
    fn test_summary_of_empty_run() {
        let summary = RunSummary::from_run(&[], &TrackerState::new());
        assert_eq!(summary.samples, 0);
        assert_eq!(summary.elapsed, 0.0);
        assert_eq!(summary.mean_power, 0.0);
        assert!(summary.mpp_power.is_none());
    }

    #[test]
    fn test_csv_output() {
        let mut out = Vec::new();
        write_csv(&mut out, &create_samples()).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "timestamp,voltage,current,power,status");
        assert_eq!(lines[2], "2,0.5,-0.03,0.015,8");
    }

    #[test]
    fn test_json_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let samples = create_samples();
        let state = TrackerState::new().with_voc(0.6);
        let summary = RunSummary::from_run(&samples, &state);
        let report = RunReport {
            generated_at: Utc::now(),
            summary: &summary,
            state: &state,
            samples: &samples,
        };

        write_report(Some(&path), OutputFormat::Json, &report).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["summary"]["samples"], 3);
        assert_eq!(value["state"]["voc"], 0.6);
        assert_eq!(value["samples"].as_array().unwrap().len(), 3);
        assert_eq!(value["samples"][1]["status"], 8);
    }
}

//! Configuration loading and parsing

use anyhow::{Context, Result};
use mppt_tracker::{Illumination, MeasurementTiming, PvCell, TrackerConfig, TrackerState};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub run: RunConfig,
    /// Seed values for the tracker state
    #[serde(default)]
    pub state: TrackerState,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Tracking time budget [s]
    #[serde(default = "default_duration")]
    pub duration: f64,
    pub nplc: Option<f64>,
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub format: OutputFormat,
    /// JSON file the tracker state is loaded from and saved back to
    pub state_file: Option<PathBuf>,
    /// Log every Nth dwell reading (0 = never)
    #[serde(default = "default_report_every")]
    pub report_every: usize,
}

fn default_duration() -> f64 {
    30.0
}

fn default_report_every() -> usize {
    100
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            nplc: None,
            output: None,
            format: OutputFormat::default(),
            state_file: None,
            report_every: default_report_every(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// Simulated bench: the cell, its light and the meter timing
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub cell: PvCell,
    #[serde(default)]
    pub illumination: Illumination,
    #[serde(default)]
    pub timing: MeasurementTiming,
    /// Derive Voc from the cell model when none is known
    #[serde(default)]
    pub auto_voc: bool,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .tracker
        .validate()
        .with_context(|| format!("Invalid [tracker] section in {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [run]
            duration = 120.0
            nplc = 2.0
            format = "csv"

            [state]
            voc = 0.62
            dwell_time = 5.0

            [tracker]
            max_angle_deviation_deg = 5.0

            [simulation.illumination]
            kind = "step"
            before = 1.0
            after = 0.5
            at = 60.0
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.run.duration, 120.0);
        assert_eq!(config.run.nplc, Some(2.0));
        assert_eq!(config.run.format, OutputFormat::Csv);
        assert_eq!(config.state.voc, Some(0.62));
        assert_eq!(config.state.dwell_time, 5.0);
        assert_eq!(config.tracker.max_angle_deviation_deg, 5.0);
        assert_eq!(config.tracker.scan_step_divisions, 301);
        assert_eq!(
            config.simulation.illumination,
            Illumination::Step {
                before: 1.0,
                after: 0.5,
                at: 60.0
            }
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.run.duration, 30.0);
        assert_eq!(config.run.report_every, 100);
        assert_eq!(config.state.voc, None);
        assert!(!config.simulation.auto_voc);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[simulation]\nauto_voc = true\n[simulation.cell]\nphotocurrent = 0.04"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert!(config.simulation.auto_voc);
        assert_eq!(config.simulation.cell.photocurrent, 0.04);
    }

    #[test]
    fn test_load_config_rejects_bad_tracker_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tracker]\nscan_step_divisions = 0").unwrap();

        assert!(load_config(file.path()).is_err());
    }
}

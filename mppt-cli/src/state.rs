//! Tracker state persistence
//!
//! Saves the tracker state as JSON after a run so the next run can pick up the
//! Mpp estimate, Isc and compliance where this one left off.

use anyhow::{Context, Result};
use mppt_tracker::TrackerState;
use std::fs;
use std::path::Path;

/// Load a saved state; a missing file means there is nothing to resume
pub fn load_state(path: &Path) -> Result<Option<TrackerState>> {
    if !path.exists() {
        log::debug!("No saved tracker state at {:?}", path);
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file: {:?}", path))?;
    let state = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse state file: {:?}", path))?;

    Ok(Some(state))
}

/// Write the state for the next run
pub fn save_state(path: &Path, state: &TrackerState) -> Result<()> {
    let json =
        serde_json::to_string_pretty(state).context("Failed to serialize tracker state")?;
    fs::write(path, json).with_context(|| format!("Failed to write state file: {:?}", path))?;
    log::info!("Tracker state saved to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = TrackerState::new().with_voc(0.64).with_vmpp(0.52);
        state.impp = Some(-0.0231);
        state.isc = Some(-0.0254);

        save_state(&path, &state).unwrap();
        let loaded = load_state(&path).unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_missing_state_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_state(&dir.path().join("nope.json")).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(load_state(&path).is_err());
    }
}

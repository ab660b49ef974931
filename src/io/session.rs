use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ct::{NpyVolumeLoader, VolumeLoader, CT};
use crate::io::document::LeadsDocument;

pub const AUTOSAVE_FILE: &str = "voxloc_autosave.json";

/// Everything needed to bring a session back after a crash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub ct_file: Option<PathBuf>,
    pub threshold: f64,
    pub leads: LeadsDocument,
    /// ISO-8601 local time of the snapshot.
    pub timestamp: String,
}

impl SessionState {
    pub fn capture(ct: &CT) -> Self {
        SessionState {
            ct_file: ct.filename().map(Path::to_path_buf),
            threshold: ct.threshold(),
            leads: ct.to_dict(),
            timestamp: Local::now().to_rfc3339(),
        }
    }
}

/// Writes a snapshot of `ct` to `path`.
pub fn save_session<P: AsRef<Path>>(ct: &CT, path: P) -> Result<()> {
    let path = path.as_ref();
    let state = SessionState::capture(ct);
    let json = serde_json::to_string_pretty(&state).context("Failed to serialize session")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write session file {}", path.display()))?;
    log::debug!("auto-saved session to {}", path.display());
    Ok(())
}

/// Restores a session with the built-in `.npy` loader.
pub fn recover_session<P: AsRef<Path>>(ct: &mut CT, path: P) -> Result<bool> {
    recover_session_with(ct, path, &NpyVolumeLoader)
}

/// Reloads the saved CT at the saved threshold and replays the saved leads.
///
/// Returns `Ok(false)` without touching `ct` when there is no session file or
/// the CT it names is gone.
pub fn recover_session_with<P: AsRef<Path>>(
    ct: &mut CT,
    path: P,
    loader: &dyn VolumeLoader,
) -> Result<bool> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(false);
    }
    log::info!("found session file {}, attempting recovery", path.display());

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session file {}", path.display()))?;
    let state: SessionState = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse session file {}", path.display()))?;

    let ct_file = match state.ct_file {
        Some(ref file) if file.exists() => file,
        _ => {
            log::warn!("CT file of session {} not found, skipping recovery", path.display());
            return Ok(false);
        }
    };

    ct.load_with(loader, ct_file, state.threshold)
        .with_context(|| format!("Failed to reload CT {}", ct_file.display()))?;
    ct.from_dict(&state.leads)
        .context("Failed to restore leads from session")?;
    log::info!("recovered session saved at {}", state.timestamp);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ct::{LeadDefinition, CT_CLOUD};
    use crate::utils::test_utils::{synthetic_volume, CLUSTER_PERCENTILE};
    use nalgebra::Vector3;
    use ndarray_npy::write_npy;

    #[test]
    fn test_save_and_recover() {
        let dir = tempfile::tempdir().unwrap();
        let ct_path = dir.path().join("ct.npy");
        let volume = synthetic_volume(40, &[Vector3::new(20.0, 20.0, 20.0)], 20, 3);
        write_npy(&ct_path, &volume.data).unwrap();

        let mut ct = CT::new(Config::default());
        ct.load(&ct_path, CLUSTER_PERCENTILE).unwrap();
        ct.set_leads(&[LeadDefinition::new("LA", "D", (1, 6))]).unwrap();
        ct.select_points_near(&Vector3::new(20.0, 20.0, 20.0), 3.0)
            .unwrap();
        ct.seed_selection("LA").unwrap();

        let session = dir.path().join(AUTOSAVE_FILE);
        save_session(&ct, &session).unwrap();

        let mut recovered = CT::new(Config::default());
        assert!(recover_session(&mut recovered, &session).unwrap());
        assert_eq!(recovered.threshold(), CLUSTER_PERCENTILE);
        assert_eq!(
            recovered.point_cloud(CT_CLOUD).unwrap().len(),
            ct.point_cloud(CT_CLOUD).unwrap().len()
        );
        assert_eq!(
            recovered.get_lead("LA").unwrap().contacts["1"].center,
            ct.get_lead("LA").unwrap().contacts["1"].center
        );
    }

    #[test]
    fn test_missing_ct_skips_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let session = dir.path().join(AUTOSAVE_FILE);
        let state = SessionState {
            ct_file: Some(dir.path().join("gone.npy")),
            threshold: 99.0,
            leads: LeadsDocument::default(),
            timestamp: Local::now().to_rfc3339(),
        };
        fs::write(&session, serde_json::to_string(&state).unwrap()).unwrap();

        let mut ct = CT::new(Config::default());
        assert!(!recover_session(&mut ct, &session).unwrap());
        assert!(!ct.is_loaded());
        assert!(!recover_session(&mut ct, dir.path().join("none.json")).unwrap());
    }

    #[test]
    fn test_corrupt_session_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let session = dir.path().join(AUTOSAVE_FILE);
        fs::write(&session, "{ not json").unwrap();
        let mut ct = CT::new(Config::default());
        assert!(recover_session(&mut ct, &session).is_err());
    }
}

//! Persisted per-mission metadata (`settings.json`).

use crate::error::{Result, SessionError};
use crate::layout;
use crate::legacy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Metadata stored in every mission folder.
///
/// `folder` and `name` always reflect where the file was read from, not what
/// it contains, so a moved mission keeps working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub folder: PathBuf,
    #[serde(default = "Utc::now")]
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub min_latitude: f64,
    #[serde(default)]
    pub max_latitude: f64,
    #[serde(default)]
    pub min_longitude: f64,
    #[serde(default)]
    pub max_longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_elevation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_elevation: Option<f64>,
    #[serde(default)]
    pub srs_id: String,
    #[serde(default)]
    pub srs_name: String,
    #[serde(default)]
    pub srs_wkt: String,
    #[serde(default)]
    pub srs_origin: String,
    /// Relative to the flight plan folder, or absolute
    #[serde(default)]
    pub loaded_flight_plans: Vec<String>,
    /// Relative to the datasets folder, or absolute
    #[serde(default)]
    pub loaded_data_sets: Vec<String>,
    /// Relative to the flight logs folder, or absolute
    #[serde(default)]
    pub flight_logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
}

impl MissionInfo {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        let folder = folder.into();
        Self {
            name: folder_name(&folder),
            folder,
            last_modified: Utc::now(),
            min_latitude: 0.0,
            max_latitude: 0.0,
            min_longitude: 0.0,
            max_longitude: 0.0,
            min_elevation: None,
            max_elevation: None,
            srs_id: String::new(),
            srs_name: String::new(),
            srs_wkt: String::new(),
            srs_origin: String::new(),
            loaded_flight_plans: Vec::new(),
            loaded_data_sets: Vec::new(),
            flight_logs: Vec::new(),
            remote_id: None,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Point the metadata at another folder; the name follows.
    pub fn set_folder(&mut self, folder: impl Into<PathBuf>) {
        self.folder = folder.into();
        self.name = folder_name(&self.folder);
    }

    /// Any flight plan, dataset or flight log recorded.
    pub fn has_loaded_data(&self) -> bool {
        !self.loaded_flight_plans.is_empty()
            || !self.loaded_data_sets.is_empty()
            || !self.flight_logs.is_empty()
    }

    /// Whether a support-report marker sits next to the mission folder.
    pub fn has_meta_data(&self) -> bool {
        self.folder
            .parent()
            .is_some_and(|parent| parent.join(layout::SUPPORT_META_FILENAME).exists())
    }
}

pub(crate) fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Read the metadata of the mission in `folder`.
///
/// A corrupt `settings.json` is deleted and the legacy `settings.mfs` is
/// migrated instead; a migrated file is written back as JSON at once.
pub fn read_from_file(folder: &Path) -> Result<MissionInfo> {
    let path = layout::settings_file(folder);
    match fs::read_to_string(&path) {
        Ok(text) => match serde_json::from_str::<MissionInfo>(&text) {
            Ok(mut info) => {
                info.set_folder(folder);
                return Ok(info);
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Corrupt mission settings, deleting");
                if let Err(e) = fs::remove_file(&path) {
                    warn!(file = %path.display(), error = %e, "Cannot delete corrupt mission settings");
                }
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(SessionError::io(&path, e)),
    }

    let legacy_path = layout::legacy_settings_file(folder);
    let xml = match fs::read_to_string(&legacy_path) {
        Ok(xml) => xml,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SessionError::MissingSettings(folder.to_path_buf()))
        }
        Err(e) => return Err(SessionError::io(&legacy_path, e)),
    };

    let info = legacy::mission_info_from_properties(folder, &xml).map_err(|source| {
        SessionError::Xml {
            path: legacy_path.clone(),
            source,
        }
    })?;
    save_to_file(&info)?;
    info!(folder = %folder.display(), "Migrated legacy mission settings");
    Ok(info)
}

/// Write `info` into its folder through the temp file.
pub fn save_to_file(info: &MissionInfo) -> Result<()> {
    let path = layout::settings_file(&info.folder);
    let temp = layout::settings_temp_file(&info.folder);
    let json = serde_json::to_string_pretty(info).map_err(|source| SessionError::Json {
        path: path.clone(),
        source,
    })?;

    fs::write(&temp, format!("{json}\n")).map_err(|e| SessionError::io(&temp, e))?;
    fs::rename(&temp, &path).map_err(|e| SessionError::io(&path, e))?;
    Ok(())
}

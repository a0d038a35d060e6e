//! On-disk layout of a mission folder.

use crate::error::{Result, SessionError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const FOLDER_NAME_FLIGHT_PLANS: &str = "Flight plans";
pub const FOLDER_NAME_LOGS: &str = "Logs";
pub const FOLDER_NAME_KML: &str = "KML";
pub const FOLDER_NAME_PLANE_CONFIG: &str = "Plane config";
pub const FOLDER_NAME_SCREENSHOTS: &str = "Screenshots";
pub const FOLDER_NAME_DATASETS: &str = "Datasets";
pub const FOLDER_NAME_FLIGHT_LOGS: &str = "Flight logs";
pub const FOLDER_NAME_AUTO_SAVE: &str = "Auto Save";

pub const SETTINGS_FILENAME: &str = "settings.json";
pub const LEGACY_SETTINGS_FILENAME: &str = "settings.mfs";
pub const SETTINGS_TEMP_FILENAME: &str = "settings.mfs~";
pub const SCREENSHOT_FILENAME: &str = "main_view_screenshot.jpg";
pub const SCREENSHOT_LOW_RES_FILENAME: &str = "main_view_screenshot_low_res.jpg";

/// Marker left next to mission folders by support-report exports.
pub const SUPPORT_META_FILENAME: &str = "meta.xml";

pub const FLIGHT_PLAN_EXTENSION: &str = "fml";

/// Sub-folder names used before the current layout, with their replacements.
pub const LEGACY_FOLDER_NAMES: [(&str, &str); 7] = [
    ("datasets", FOLDER_NAME_DATASETS),
    ("flightplans", FOLDER_NAME_FLIGHT_PLANS),
    ("ftp", FOLDER_NAME_FLIGHT_LOGS),
    ("kml", FOLDER_NAME_KML),
    ("log", FOLDER_NAME_LOGS),
    ("planeconfig", FOLDER_NAME_PLANE_CONFIG),
    ("screenshot", FOLDER_NAME_SCREENSHOTS),
];

/// Files that do not count as mission content.
const IGNORED_FILENAMES: [&str; 5] = [
    LEGACY_SETTINGS_FILENAME,
    SETTINGS_FILENAME,
    SETTINGS_TEMP_FILENAME,
    SCREENSHOT_FILENAME,
    SCREENSHOT_LOW_RES_FILENAME,
];

pub fn flight_plan_folder(mission: &Path) -> PathBuf {
    mission.join(FOLDER_NAME_FLIGHT_PLANS)
}

pub fn datasets_folder(mission: &Path) -> PathBuf {
    mission.join(FOLDER_NAME_DATASETS)
}

pub fn flight_logs_folder(mission: &Path) -> PathBuf {
    mission.join(FOLDER_NAME_FLIGHT_LOGS)
}

pub fn screenshot_folder(mission: &Path) -> PathBuf {
    mission.join(FOLDER_NAME_SCREENSHOTS)
}

pub fn settings_file(mission: &Path) -> PathBuf {
    mission.join(SETTINGS_FILENAME)
}

pub fn legacy_settings_file(mission: &Path) -> PathBuf {
    mission.join(LEGACY_SETTINGS_FILENAME)
}

pub fn settings_temp_file(mission: &Path) -> PathBuf {
    mission.join(SETTINGS_TEMP_FILENAME)
}

/// Every folder a mission is expected to contain, relative to its root.
pub fn mission_subfolders() -> Vec<PathBuf> {
    vec![
        PathBuf::from(FOLDER_NAME_FLIGHT_PLANS),
        PathBuf::from(FOLDER_NAME_LOGS),
        PathBuf::from(FOLDER_NAME_KML),
        PathBuf::from(FOLDER_NAME_PLANE_CONFIG),
        Path::new(FOLDER_NAME_FLIGHT_PLANS).join(FOLDER_NAME_AUTO_SAVE),
        Path::new(FOLDER_NAME_PLANE_CONFIG).join(FOLDER_NAME_AUTO_SAVE),
        PathBuf::from(FOLDER_NAME_FLIGHT_LOGS),
        PathBuf::from(FOLDER_NAME_DATASETS),
        PathBuf::from(FOLDER_NAME_SCREENSHOTS),
    ]
}

/// Create any missing sub-folder of `mission`.
pub fn create_mission_folders(mission: &Path) -> Result<()> {
    for sub in mission_subfolders() {
        let path = mission.join(sub);
        fs::create_dir_all(&path).map_err(|e| SessionError::io(&path, e))?;
    }
    Ok(())
}

/// Move lowercase sub-folders of older releases to their current names.
///
/// A legacy folder is left alone when its replacement already exists.
pub fn rename_legacy_folders(mission: &Path) {
    for (legacy, current) in LEGACY_FOLDER_NAMES {
        let from = mission.join(legacy);
        let to = mission.join(current);
        if !from.is_dir() || to.exists() {
            continue;
        }
        match fs::rename(&from, &to) {
            Ok(()) => info!(from = %from.display(), to = %to.display(), "Renamed legacy mission folder"),
            Err(e) => warn!(folder = %from.display(), error = %e, "Cannot rename legacy mission folder"),
        }
    }
}

/// A directory holding either settings file.
pub fn is_mission_folder(path: &Path) -> bool {
    path.is_dir() && (settings_file(path).exists() || legacy_settings_file(path).exists())
}

/// Whether `dir` holds any file besides settings and screenshots, searching
/// sub-folders recursively. Unreadable folders count as empty.
pub fn has_non_empty_folder(dir: &Path) -> bool {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return false,
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        if IGNORED_FILENAMES.iter().any(|ignored| name == *ignored) {
            continue;
        }

        let path = entry.path();
        if path.is_dir() {
            if has_non_empty_folder(&path) {
                return true;
            }
        } else {
            return true;
        }
    }
    false
}

pub fn is_flight_plan_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(FLIGHT_PLAN_EXTENSION))
}

/// Flight plan files directly inside `folder`, sorted by name.
pub fn list_flight_plan_files(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match fs::read_dir(folder) {
        Ok(entries) => entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_flight_plan_file(path))
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

/// Copy each of `files` into `folder` unless a file of that name is
/// already there. A file that cannot be copied is logged and skipped.
/// Returns the number of files copied.
pub fn copy_flight_plan_files(files: &[PathBuf], folder: &Path) -> usize {
    let mut copied = 0;
    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let target = folder.join(name);
        if target.exists() {
            continue;
        }
        match fs::copy(file, &target) {
            Ok(_) => {
                debug!(from = %file.display(), to = %target.display(), "Copied flight plan");
                copied += 1;
            }
            Err(e) => {
                warn!(from = %file.display(), to = %target.display(), error = %e, "Cannot copy flight plan")
            }
        }
    }
    copied
}

/// Path of `target` relative to `base` when it lives below it, otherwise
/// the full path. Separators are always `/`.
pub fn relative_or_absolute(base: &Path, target: &Path) -> String {
    match target.strip_prefix(base) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => target.to_string_lossy().into_owned(),
    }
}

/// Inverse of [`relative_or_absolute`].
pub fn resolve(base: &Path, stored: &str) -> PathBuf {
    let path = Path::new(stored);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        stored.split('/').fold(base.to_path_buf(), |acc, part| acc.join(part))
    }
}

/// Remove `dir` and everything below it. Returns whether it is gone.
pub fn delete_recursively(dir: &Path) -> bool {
    match fs::remove_dir_all(dir) {
        Ok(()) => true,
        Err(e) => {
            warn!(folder = %dir.display(), error = %e, "Error deleting directory");
            false
        }
    }
}

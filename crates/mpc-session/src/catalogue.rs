//! Known missions and the folder operations on them.
//!
//! The catalogue lists every mission folder below the project folder plus
//! the referenced projects living elsewhere. Refreshing it migrates legacy
//! folders, re-creates missing sub-folders and prunes empty missions.

use crate::config::SessionConfig;
use crate::dialog::{keys, Localizer, Notifier, ScreenshotProvider, Toast};
use crate::error::{Result, SessionError};
use crate::layout;
use crate::mission::{Mission, DEMO_MISSION_NAME};
use crate::mission_info::{self, MissionInfo};
use chrono::{Local, Utc};
use mpc_core::{DocumentLoader, PlanningContext};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Folder name format of new missions.
pub const NEW_MISSION_NAME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

const CLONE_PREFIX: &str = "Clone of ";

pub struct MissionCatalogue {
    project_folder: PathBuf,
    referenced_projects: Mutex<Vec<PathBuf>>,
    known: Mutex<Vec<MissionInfo>>,
    /// Folder of the loaded mission, never pruned
    current: Mutex<Option<PathBuf>>,
    initialized: AtomicBool,
    loader: Arc<dyn DocumentLoader>,
    context: PlanningContext,
    notifier: Arc<dyn Notifier>,
    localizer: Arc<dyn Localizer>,
    screenshots: Arc<dyn ScreenshotProvider>,
}

impl MissionCatalogue {
    pub fn new(
        config: &SessionConfig,
        context: PlanningContext,
        loader: Arc<dyn DocumentLoader>,
        notifier: Arc<dyn Notifier>,
        localizer: Arc<dyn Localizer>,
        screenshots: Arc<dyn ScreenshotProvider>,
    ) -> Self {
        Self {
            project_folder: config.project_folder.clone(),
            referenced_projects: Mutex::new(config.referenced_projects.clone()),
            known: Mutex::new(Vec::new()),
            current: Mutex::new(None),
            initialized: AtomicBool::new(false),
            loader,
            context,
            notifier,
            localizer,
            screenshots,
        }
    }

    pub fn project_folder(&self) -> &Path {
        &self.project_folder
    }

    pub fn referenced_projects(&self) -> Vec<PathBuf> {
        self.referenced_projects.lock().clone()
    }

    pub fn set_current(&self, folder: Option<PathBuf>) {
        *self.current.lock() = folder;
    }

    fn is_current(&self, folder: &Path) -> bool {
        self.current.lock().as_deref() == Some(folder)
    }

    /// Known missions, newest first. Scans the disk on first use.
    pub fn missions(&self) -> Vec<MissionInfo> {
        if !self.initialized.load(Ordering::SeqCst) {
            return self.refresh();
        }
        self.known.lock().clone()
    }

    /// Rescan the project folder and referenced projects.
    pub fn refresh(&self) -> Vec<MissionInfo> {
        if let Err(e) = fs::create_dir_all(&self.project_folder) {
            warn!(folder = %self.project_folder.display(), error = %e, "Cannot create project folder");
        }

        let mut candidates: Vec<PathBuf> = match fs::read_dir(&self.project_folder) {
            Ok(entries) => entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect(),
            Err(e) => {
                warn!(folder = %self.project_folder.display(), error = %e, "Cannot list project folder");
                Vec::new()
            }
        };

        {
            let mut referenced = self.referenced_projects.lock();
            referenced.retain(|folder| {
                let exists = folder.is_dir();
                if !exists {
                    info!(folder = %folder.display(), "Dropping vanished referenced project");
                }
                exists
            });
            referenced.dedup();
            for folder in referenced.iter() {
                if !candidates.contains(folder) {
                    candidates.push(folder.clone());
                }
            }
        }

        let mut infos = Vec::new();
        for folder in candidates {
            if !layout::is_mission_folder(&folder) {
                continue;
            }
            layout::rename_legacy_folders(&folder);
            if let Err(e) = layout::create_mission_folders(&folder) {
                warn!(folder = %folder.display(), error = %e, "Cannot create mission folders");
            }

            let info = mission_info::read_from_file(&folder).unwrap_or_else(|e| {
                warn!(folder = %folder.display(), error = %e, "Cannot read mission settings");
                MissionInfo::new(&folder)
            });
            if self.delete_empty_mission_info(&info) {
                continue;
            }
            infos.push(info);
        }

        infos.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        *self.known.lock() = infos.clone();
        self.initialized.store(true, Ordering::SeqCst);
        debug!(missions = infos.len(), "Mission catalogue refreshed");
        infos
    }

    fn remember(&self, info: MissionInfo) {
        let mut known = self.known.lock();
        known.retain(|known| known.folder != info.folder);
        known.push(info);
        known.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    }

    fn forget(&self, folder: &Path) {
        self.known.lock().retain(|known| known.folder != folder);
    }

    /// Create `name` below the project folder with every sub-folder.
    pub fn create_mission_folder(&self, name: &str) -> Result<PathBuf> {
        let folder = self.project_folder.join(name);
        let created = fs::create_dir_all(&self.project_folder)
            .and_then(|()| fs::create_dir(&folder));

        if let Err(e) = created {
            let error = SessionError::io(&folder, e);
            let text = match &error {
                SessionError::FolderExists(_) => self.localizer.get(keys::FOLDER_EXISTS, &[name]),
                SessionError::NotFound(_) => self.localizer.get(
                    keys::FOLDER_NOT_FOUND,
                    &[self.project_folder.to_string_lossy().as_ref()],
                ),
                SessionError::PermissionDenied(_) => self
                    .localizer
                    .get(keys::FOLDER_DENIED, &[folder.to_string_lossy().as_ref()]),
                other => self.localizer.get(keys::IO_ERROR, &[other.to_string().as_str()]),
            };
            self.notifier.notify(Toast::alert(text));
            return Err(error);
        }

        layout::create_mission_folders(&folder)?;
        Ok(folder)
    }

    /// Create a mission named after the current local time.
    pub fn create_new_mission(&self) -> Result<Mission> {
        let stamp = Local::now().format(NEW_MISSION_NAME_FORMAT).to_string();
        let name = self.unique_name(&stamp);
        let folder = self.create_mission_folder(&name)?;

        let mission = Mission::open(
            MissionInfo::new(&folder),
            self.loader.clone(),
            self.context.clone(),
        )?;
        self.remember(mission.info());
        info!(mission = %name, "Created mission");
        Ok(mission)
    }

    /// Load the mission in `folder`, registering it when it is new to the
    /// catalogue. Folders outside the project folder become referenced
    /// projects.
    pub fn open_mission(&self, folder: &Path) -> Result<Mission> {
        if !folder.is_dir() {
            return Err(SessionError::NotFound(folder.to_path_buf()));
        }

        layout::rename_legacy_folders(folder);
        layout::create_mission_folders(folder)?;
        let info = mission_info::read_from_file(folder).unwrap_or_else(|e| {
            debug!(folder = %folder.display(), error = %e, "Starting with fresh mission settings");
            MissionInfo::new(folder)
        });

        if !folder.starts_with(&self.project_folder) {
            let mut referenced = self.referenced_projects.lock();
            if !referenced.iter().any(|known| known == folder) {
                referenced.push(folder.to_path_buf());
            }
        }

        let mission = Mission::open(info, self.loader.clone(), self.context.clone())?;
        self.remember(mission.info());
        Ok(mission)
    }

    /// Copy `source` into a new mission named "Clone of <name>".
    ///
    /// Unsaved flight plans are written into the clone when they can be
    /// saved and left out otherwise; saved flight plan files are copied
    /// over, and a failed copy is logged and skipped. The source mission and
    /// its plans are never modified. When the clone cannot be completed its
    /// folder is removed again.
    pub fn clone_mission(&self, source: &Mission) -> Result<Mission> {
        self.make_default_screenshot(source);

        let source_folder = source.directory();
        if !source_folder.exists() {
            return Err(SessionError::NotFound(source_folder));
        }

        let target_name = self.unique_name(&format!("{CLONE_PREFIX}{}", source.name()));
        let target_folder = self.project_folder.join(&target_name);
        if target_folder.exists() {
            return Err(SessionError::FolderExists(target_folder));
        }
        self.create_mission_folder(&target_name)?;

        match self.populate_clone(source, &target_folder) {
            Ok(clone) => {
                self.make_default_screenshot(&clone);
                self.remember(clone.info());
                info!(mission = %source.name(), clone = %target_name, "Cloned mission");
                Ok(clone)
            }
            Err(e) => {
                warn!(clone = %target_name, error = %e, "Removing incomplete clone");
                layout::delete_recursively(&target_folder);
                self.forget(&target_folder);
                Err(e)
            }
        }
    }

    fn populate_clone(&self, source: &Mission, target_folder: &Path) -> Result<Mission> {
        let source_plans_folder = source.flight_plan_folder();
        let target_plans_folder = layout::flight_plan_folder(target_folder);
        let in_target = |file: &Path| -> Option<PathBuf> {
            if file.parent() == Some(source_plans_folder.as_path()) {
                file.file_name().map(|name| target_plans_folder.join(name))
            } else {
                None
            }
        };

        let mut loaded = Vec::new();
        for plan in source.flight_plans().get() {
            if plan.has_unsaved_changes() {
                if !plan.can_be_saved() {
                    info!(flight_plan = %plan.name(), "Flight plan not saveable, left out of clone");
                    continue;
                }
                let file = plan.file().and_then(|file| in_target(&file)).unwrap_or_else(|| {
                    target_plans_folder.join(format!(
                        "{}.{}",
                        plan.name(),
                        layout::FLIGHT_PLAN_EXTENSION
                    ))
                });
                match plan.save_copy(&file) {
                    Ok(()) => {
                        info!(flight_plan = %plan.name(), "Flight plan saved into clone");
                        loaded.push(file);
                    }
                    Err(e) => {
                        warn!(flight_plan = %plan.name(), error = %e, "Cannot save flight plan into clone")
                    }
                }
            } else if let Some(file) = plan.file() {
                loaded.push(in_target(&file).unwrap_or(file));
            }
        }

        layout::copy_flight_plan_files(
            &layout::list_flight_plan_files(&source_plans_folder),
            &target_plans_folder,
        );

        let mut info = source.info();
        info.set_folder(target_folder);
        info.last_modified = Utc::now();
        info.remote_id = None;
        info.loaded_flight_plans = loaded
            .iter()
            .map(|file| layout::relative_or_absolute(&target_plans_folder, file))
            .collect();
        // datasets and flight logs stay where they are
        info.loaded_data_sets = absolute(&source.datasets_folder(), &info.loaded_data_sets);
        info.flight_logs = absolute(&source.flight_logs_folder(), &info.flight_logs);
        mission_info::save_to_file(&info)?;

        let info = mission_info::read_from_file(target_folder)?;
        let clone = Mission::open(info, self.loader.clone(), self.context.clone())?;
        clone.set_empty(false);
        Ok(clone)
    }

    /// Move the mission folder to `new_name` and repoint its resources.
    /// The name is not validated.
    pub fn rename_mission(&self, mission: &Mission, new_name: &str) -> Result<()> {
        let source = mission.directory();
        let parent = source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.project_folder.clone());
        let target = parent.join(new_name);

        let moved = if target.exists() {
            Err(SessionError::FolderExists(target.clone()))
        } else {
            fs::rename(&source, &target).map_err(|e| SessionError::io(&source, e))
        };
        if let Err(e) = moved {
            self.notifier
                .notify(Toast::alert(self.localizer.get(keys::CANNOT_RENAME, &[e.to_string().as_str()])));
            return Err(e);
        }

        self.referenced_projects
            .lock()
            .retain(|folder| folder != &source);
        mission.set_directory(target.clone());
        mission.relocate_resources(&source);
        if self.is_current(&source) {
            self.set_current(Some(target.clone()));
        }

        mission.save()?;
        self.forget(&source);
        self.remember(mission.info());
        info!(from = %source.display(), to = %target.display(), "Renamed mission");
        Ok(())
    }

    /// Delete `mission` when it is empty and not loaded.
    pub fn delete_empty_mission(&self, mission: &Mission) -> bool {
        if self.delete_empty_mission_info(&mission.info()) {
            self.refresh();
            true
        } else {
            false
        }
    }

    /// Not loaded, no content, nothing recorded and no support marker.
    fn is_prunable(&self, info: &MissionInfo) -> bool {
        let folder = info.folder();
        !self.is_current(folder)
            && folder.is_dir()
            && !layout::has_non_empty_folder(folder)
            && !info.has_loaded_data()
            && !info.has_meta_data()
    }

    fn delete_empty_mission_info(&self, info: &MissionInfo) -> bool {
        self.is_prunable(info) && self.delete_mission_folder(info)
    }

    fn delete_mission_folder(&self, info: &MissionInfo) -> bool {
        let folder = info.folder();
        if layout::delete_recursively(folder) {
            info!(mission = %info.name, "Deleted empty mission");
            self.forget(folder);
            true
        } else {
            self.notifier.notify(Toast::alert(
                self.localizer.get(keys::CANNOT_DELETE_EMPTY, &[info.name.as_str()]),
            ));
            false
        }
    }

    /// Delete every empty mission that is not loaded. Returns whether all
    /// deletions succeeded.
    pub fn delete_empty_missions(&self) -> bool {
        let mut successful = true;
        for info in self.missions() {
            if self.is_prunable(&info) && !self.delete_mission_folder(&info) {
                successful = false;
            }
        }
        successful
    }

    /// Delete the demo mission's folder. Other missions are left alone.
    pub fn delete_demo_mission(&self, mission: &Mission) -> bool {
        let deleted = mission.is_demo() && layout::delete_recursively(&mission.directory());
        if deleted {
            info!("Deleted demo mission");
            self.forget(&mission.directory());
        }
        self.refresh();
        deleted
    }

    /// No content besides settings and screenshots.
    pub fn is_mission_empty(&self, info: &MissionInfo) -> bool {
        info.folder().is_dir() && !layout::has_non_empty_folder(info.folder())
    }

    /// Whether the mission has at least one flight plan file.
    pub fn is_mission_cloneable(&self, info: &MissionInfo) -> bool {
        !layout::list_flight_plan_files(&layout::flight_plan_folder(info.folder())).is_empty()
    }

    /// Known by name, or a folder of that name exists in the project folder.
    pub fn mission_exists(&self, name: &str) -> bool {
        self.known.lock().iter().any(|info| info.name == name)
            || self.project_folder.join(name).exists()
    }

    pub fn mission_has_clone(&self, mission: &Mission) -> bool {
        self.mission_exists(&format!("{CLONE_PREFIX}{}", mission.name()))
    }

    /// `base`, or `base (N)` with the smallest N >= 2 that is free.
    pub fn unique_name(&self, base: &str) -> String {
        if !self.mission_exists(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base} ({n})"))
            .find(|candidate| !self.mission_exists(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn is_valid_mission_name(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        if self
            .known
            .lock()
            .iter()
            .any(|info| info.name.eq_ignore_ascii_case(name))
        {
            return false;
        }
        if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') || name.contains("..") {
            return false;
        }
        if cfg!(windows) && is_reserved_device_name(name) {
            return false;
        }
        if name.eq_ignore_ascii_case(DEMO_MISSION_NAME) {
            return false;
        }
        if name.ends_with('.') || name.trim() != name {
            return false;
        }
        self.can_create_file_named(name)
    }

    /// Try to create `name` as a file in the project folder.
    fn can_create_file_named(&self, name: &str) -> bool {
        let _ = fs::create_dir_all(&self.project_folder);
        let candidate = self.project_folder.join(name);
        match fs::OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => {
                drop(file);
                if let Err(e) = fs::remove_file(&candidate) {
                    warn!(file = %candidate.display(), error = %e, "Cannot delete name test file");
                }
                true
            }
            Err(e) => {
                debug!(name, error = %e, "Invalid name for mission");
                false
            }
        }
    }

    /// Take a screenshot unless the mission already has one.
    pub fn make_default_screenshot(&self, mission: &Mission) {
        let file = mission.screenshot_folder().join(layout::SCREENSHOT_FILENAME);
        if !file.exists() {
            self.make_screenshot(mission);
        }
    }

    pub fn make_screenshot(&self, mission: &Mission) {
        let folder = mission.screenshot_folder();
        if !folder.is_dir() {
            // mission folder was pruned
            return;
        }
        let Some(shot) = self.screenshots.capture() else {
            return;
        };

        let written = fs::write(folder.join(layout::SCREENSHOT_FILENAME), &shot.full).and_then(
            |()| fs::write(folder.join(layout::SCREENSHOT_LOW_RES_FILENAME), &shot.low_res),
        );
        match written {
            Ok(()) => info!(mission = %mission.name(), "Created screenshot of mission"),
            Err(e) => warn!(mission = %mission.name(), error = %e, "Cannot create screenshot of mission"),
        }
    }
}

fn absolute(base: &Path, stored: &[String]) -> Vec<String> {
    stored
        .iter()
        .map(|s| layout::resolve(base, s).to_string_lossy().into_owned())
        .collect()
}

/// Device names Windows refuses as file names.
pub fn is_reserved_device_name(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "CON" | "PRN" | "AUX" | "NUL" => true,
        _ => ["COM", "LPT"].iter().any(|prefix| {
            upper
                .strip_prefix(prefix)
                .is_some_and(|n| matches!(n, "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_device_names() {
        assert!(is_reserved_device_name("con"));
        assert!(is_reserved_device_name("LPT3"));
        assert!(!is_reserved_device_name("COM10"));
        assert!(!is_reserved_device_name("Survey"));
    }
}

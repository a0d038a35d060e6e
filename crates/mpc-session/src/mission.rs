//! A mission: one project folder with its flight plans, datasets and logs.

use crate::error::{Result, SessionError};
use crate::layout;
use crate::mission_info::{self, folder_name, MissionInfo};
use chrono::{DateTime, Utc};
use mpc_core::{DocumentLoader, FlightPlanModel, ListProperty, PlanningContext, Property};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reserved name of the bundled demo mission.
pub const DEMO_MISSION_NAME: &str = "DEMO";

/// Descriptor written into every dataset folder.
pub const MATCHING_DESCRIPTOR_FILENAME: &str = "dataset.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingStatus {
    /// Being imported; not yet recorded in the mission settings
    New,
    Imported,
}

#[derive(Debug, Serialize, Deserialize)]
struct MatchingDescriptor {
    name: String,
    status: MatchingStatus,
}

struct MatchingInner {
    name: Property<String>,
    folder: Mutex<PathBuf>,
    status: Mutex<MatchingStatus>,
    changed: AtomicBool,
}

/// A photo dataset referenced by a mission. Compared by identity.
#[derive(Clone)]
pub struct Matching {
    inner: Arc<MatchingInner>,
}

impl Matching {
    /// A dataset that has not been written yet.
    pub fn new(folder: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self::build(folder.into(), name.into(), MatchingStatus::New, true)
    }

    /// Open the dataset stored in `folder`.
    pub fn open(folder: &Path) -> Result<Self> {
        if !folder.is_dir() {
            return Err(SessionError::NotFound(folder.to_path_buf()));
        }

        let path = folder.join(MATCHING_DESCRIPTOR_FILENAME);
        let (name, status) = match fs::read_to_string(&path) {
            Ok(text) => {
                let descriptor: MatchingDescriptor =
                    serde_json::from_str(&text).map_err(|source| SessionError::Json {
                        path: path.clone(),
                        source,
                    })?;
                (descriptor.name, descriptor.status)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (folder_name(folder), MatchingStatus::Imported)
            }
            Err(e) => return Err(SessionError::io(&path, e)),
        };

        Ok(Self::build(folder.to_path_buf(), name, status, false))
    }

    fn build(folder: PathBuf, name: String, status: MatchingStatus, changed: bool) -> Self {
        Self {
            inner: Arc::new(MatchingInner {
                name: Property::new(name),
                folder: Mutex::new(folder),
                status: Mutex::new(status),
                changed: AtomicBool::new(changed),
            }),
        }
    }

    pub fn name(&self) -> String {
        self.inner.name.get()
    }

    pub fn folder(&self) -> PathBuf {
        self.inner.folder.lock().clone()
    }

    pub fn set_folder(&self, folder: PathBuf) {
        *self.inner.folder.lock() = folder;
    }

    pub fn status(&self) -> MatchingStatus {
        *self.inner.status.lock()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.inner.changed.load(Ordering::SeqCst)
    }

    pub fn mark_changed(&self) {
        self.inner.changed.store(true, Ordering::SeqCst);
    }

    pub fn can_be_saved(&self) -> bool {
        true
    }

    /// Write the descriptor; the dataset counts as imported afterwards.
    pub fn save(&self) -> Result<()> {
        let folder = self.folder();
        fs::create_dir_all(&folder).map_err(|e| SessionError::io(&folder, e))?;

        let path = folder.join(MATCHING_DESCRIPTOR_FILENAME);
        let descriptor = MatchingDescriptor {
            name: self.name(),
            status: MatchingStatus::Imported,
        };
        let json = serde_json::to_string_pretty(&descriptor).map_err(|source| SessionError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|e| SessionError::io(&path, e))?;

        *self.inner.status.lock() = MatchingStatus::Imported;
        self.inner.changed.store(false, Ordering::SeqCst);
        Ok(())
    }
}

impl PartialEq for Matching {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Matching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matching")
            .field("name", &self.name())
            .field("folder", &self.folder())
            .finish()
    }
}

/// Something in a mission with changes not yet written to disk.
#[derive(Debug, Clone, PartialEq)]
pub enum UnsavedItem {
    FlightPlan(FlightPlanModel),
    Matching(Matching),
}

impl UnsavedItem {
    pub fn name(&self) -> String {
        match self {
            Self::FlightPlan(plan) => plan.name(),
            Self::Matching(matching) => matching.name(),
        }
    }
}

struct MissionInner {
    directory: Property<PathBuf>,
    name: Property<String>,
    last_modified: Property<DateTime<Utc>>,
    /// Bounding box, SRS and remote id as last read or written
    info: Mutex<MissionInfo>,
    flight_plans: ListProperty<FlightPlanModel>,
    matchings: ListProperty<Matching>,
    flight_logs: ListProperty<PathBuf>,
    empty: Property<bool>,
    loader: Arc<dyn DocumentLoader>,
    context: PlanningContext,
}

/// A loaded mission. Clones share state; equality is identity.
#[derive(Clone)]
pub struct Mission {
    inner: Arc<MissionInner>,
}

impl Mission {
    /// Load the mission described by `info` and rewrite its settings file.
    ///
    /// Flight plans, datasets and flight logs that cannot be opened are
    /// skipped.
    pub fn open(
        info: MissionInfo,
        loader: Arc<dyn DocumentLoader>,
        context: PlanningContext,
    ) -> Result<Self> {
        let folder = info.folder().to_path_buf();
        if !folder.is_dir() {
            return Err(SessionError::NotADirectory(folder));
        }

        let mission = Self {
            inner: Arc::new(MissionInner {
                name: Property::new(folder_name(&folder)),
                directory: Property::new(folder),
                last_modified: Property::new(info.last_modified),
                info: Mutex::new(info.clone()),
                flight_plans: ListProperty::new(),
                matchings: ListProperty::new(),
                flight_logs: ListProperty::new(),
                empty: Property::new(true),
                loader,
                context,
            }),
        };

        mission.load_flight_plans(&info);
        mission.load_data_sets(&info);
        mission.load_flight_logs(&info);
        mission.write_settings()?;

        debug!(
            mission = %mission.name(),
            flight_plans = mission.inner.flight_plans.len(),
            "Mission loaded"
        );
        Ok(mission)
    }

    fn load_flight_plans(&self, info: &MissionInfo) {
        let folder = self.flight_plan_folder();
        let plans = info
            .loaded_flight_plans
            .iter()
            .filter_map(|stored| {
                let path = layout::resolve(&folder, stored);
                match self.inner.loader.open(&path) {
                    Ok(document) => Some(FlightPlanModel::new(
                        document,
                        false,
                        &self.inner.context,
                    )),
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "Skipping flight plan");
                        None
                    }
                }
            })
            .collect();
        self.inner.flight_plans.replace_all(plans);
    }

    fn load_data_sets(&self, info: &MissionInfo) {
        let folder = self.datasets_folder();
        let matchings = info
            .loaded_data_sets
            .iter()
            .filter_map(|stored| match Matching::open(&layout::resolve(&folder, stored)) {
                Ok(matching) => Some(matching),
                Err(e) => {
                    warn!(dataset = %stored, error = %e, "Skipping dataset");
                    None
                }
            })
            .collect();
        self.inner.matchings.replace_all(matchings);
    }

    fn load_flight_logs(&self, info: &MissionInfo) {
        let folder = self.flight_logs_folder();
        let logs = info
            .flight_logs
            .iter()
            .map(|stored| layout::resolve(&folder, stored))
            .collect();
        self.inner.flight_logs.replace_all(logs);
    }

    pub fn name(&self) -> String {
        self.inner.name.get()
    }

    pub fn name_property(&self) -> &Property<String> {
        &self.inner.name
    }

    pub fn directory(&self) -> PathBuf {
        self.inner.directory.get()
    }

    /// Point the mission at a moved folder. Settings are not rewritten.
    pub fn set_directory(&self, directory: PathBuf) {
        self.inner.name.set(folder_name(&directory));
        self.inner.info.lock().set_folder(&directory);
        self.inner.directory.set(directory);
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.inner.last_modified.get()
    }

    pub fn is_demo(&self) -> bool {
        self.name() == DEMO_MISSION_NAME
    }

    pub fn flight_plan_folder(&self) -> PathBuf {
        layout::flight_plan_folder(&self.directory())
    }

    pub fn datasets_folder(&self) -> PathBuf {
        layout::datasets_folder(&self.directory())
    }

    pub fn flight_logs_folder(&self) -> PathBuf {
        layout::flight_logs_folder(&self.directory())
    }

    pub fn screenshot_folder(&self) -> PathBuf {
        layout::screenshot_folder(&self.directory())
    }

    pub fn flight_plans(&self) -> &ListProperty<FlightPlanModel> {
        &self.inner.flight_plans
    }

    pub fn matchings(&self) -> &ListProperty<Matching> {
        &self.inner.matchings
    }

    pub fn flight_logs(&self) -> &ListProperty<PathBuf> {
        &self.inner.flight_logs
    }

    pub fn planning_context(&self) -> &PlanningContext {
        &self.inner.context
    }

    /// True until something was cloned into or created in the mission.
    pub fn is_empty(&self) -> bool {
        self.inner.empty.get()
    }

    pub fn set_empty(&self, empty: bool) {
        self.inner.empty.set(empty);
    }

    /// Open the flight plan in `path` and add it to the mission.
    pub fn load_flight_plan(&self, path: &Path) -> Result<FlightPlanModel> {
        let document = self.inner.loader.open(path)?;
        let plan = FlightPlanModel::new(document, false, &self.inner.context);
        self.add_flight_plan(plan.clone())?;
        Ok(plan)
    }

    pub fn add_flight_plan(&self, plan: FlightPlanModel) -> Result<()> {
        self.inner.flight_plans.push(plan);
        self.set_empty(false);
        self.write_settings()
    }

    /// Remove `plan` from the mission and stop tracking its document.
    pub fn close_flight_plan(&self, plan: &FlightPlanModel) -> Result<()> {
        for removed in self.inner.flight_plans.remove_if(|p| p == plan) {
            removed.dispose();
        }
        self.write_settings()
    }

    pub fn add_matching(&self, matching: Matching) -> Result<()> {
        self.inner.matchings.push(matching);
        self.write_settings()
    }

    /// Record a flight log. A log newer than the mission bumps its timestamp.
    pub fn add_flight_log(&self, file: PathBuf) -> Result<()> {
        let modified = fs::metadata(&file)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        self.inner.flight_logs.push(file);

        if let Some(modified) = modified {
            if modified > self.last_modified() && modified < Utc::now() {
                self.inner.last_modified.set(modified);
            }
        }
        self.write_settings()
    }

    pub fn has_unsaved_items(&self) -> bool {
        !self.all_unsaved_items().is_empty()
    }

    /// Saveable datasets and flight plans with pending changes, datasets first.
    pub fn all_unsaved_items(&self) -> Vec<UnsavedItem> {
        let matchings = self
            .inner
            .matchings
            .get()
            .into_iter()
            .filter(|m| m.can_be_saved() && m.has_unsaved_changes())
            .map(UnsavedItem::Matching);
        let plans = self
            .inner
            .flight_plans
            .get()
            .into_iter()
            .filter(|p| p.can_be_saved() && p.has_unsaved_changes())
            .map(UnsavedItem::FlightPlan);
        matchings.chain(plans).collect()
    }

    /// Write a flight plan into the mission's flight plan folder unless it
    /// already has a file, then record it.
    pub fn save_flight_plan(&self, plan: &FlightPlanModel) -> Result<()> {
        if plan.file().is_none() {
            let file = self.flight_plan_folder().join(format!(
                "{}.{}",
                plan.name(),
                layout::FLIGHT_PLAN_EXTENSION
            ));
            plan.set_file_location(file);
        }
        plan.save()?;
        info!(flight_plan = %plan.name(), mission = %self.name(), "Flight plan saved");

        if !self.inner.flight_plans.get().contains(plan) {
            self.inner.flight_plans.push(plan.clone());
        }
        self.write_settings()
    }

    /// Touch the timestamp and rewrite the settings file.
    pub fn save(&self) -> Result<()> {
        self.inner.last_modified.set(Utc::now());
        self.write_settings()
    }

    /// Current metadata as it would be written.
    pub fn info(&self) -> MissionInfo {
        let directory = self.directory();
        let plans_folder = layout::flight_plan_folder(&directory);
        let datasets_folder = layout::datasets_folder(&directory);
        let logs_folder = layout::flight_logs_folder(&directory);

        let mut info = self.inner.info.lock().clone();
        info.set_folder(&directory);
        info.last_modified = self.last_modified();
        info.loaded_flight_plans = self
            .inner
            .flight_plans
            .get()
            .iter()
            .filter_map(|plan| plan.file())
            .map(|file| layout::relative_or_absolute(&plans_folder, &file))
            .collect();
        info.loaded_data_sets = self
            .inner
            .matchings
            .get()
            .iter()
            .filter(|m| m.status() != MatchingStatus::New)
            .map(|m| layout::relative_or_absolute(&datasets_folder, &m.folder()))
            .collect();
        info.flight_logs = self
            .inner
            .flight_logs
            .get()
            .iter()
            .map(|file| layout::relative_or_absolute(&logs_folder, file))
            .collect();
        info
    }

    fn write_settings(&self) -> Result<()> {
        let info = self.info();
        mission_info::save_to_file(&info)?;
        *self.inner.info.lock() = info;
        Ok(())
    }

    /// After the folder moved from `old_directory`, repoint every flight
    /// plan, dataset and flight log that lived in the old folder. Resources
    /// stored elsewhere keep their location.
    pub fn relocate_resources(&self, old_directory: &Path) {
        let directory = self.directory();

        let from = layout::flight_plan_folder(old_directory);
        let to = layout::flight_plan_folder(&directory);
        for plan in self.inner.flight_plans.get() {
            relocate_flight_plan(&plan, &from, &to);
        }

        let from = layout::datasets_folder(old_directory);
        let to = layout::datasets_folder(&directory);
        for matching in self.inner.matchings.get() {
            if let Some(folder) = relocated(&matching.folder(), &from, &to) {
                matching.set_folder(folder);
            }
        }

        let from = layout::flight_logs_folder(old_directory);
        let to = layout::flight_logs_folder(&directory);
        let logs = self
            .inner
            .flight_logs
            .get()
            .into_iter()
            .map(|log| relocated(&log, &from, &to).unwrap_or(log))
            .collect::<Vec<_>>();
        if logs != self.inner.flight_logs.get() {
            self.inner.flight_logs.replace_all(logs);
        }
    }

    /// Stop tracking every flight plan document.
    pub fn dispose(&self) {
        for plan in self.inner.flight_plans.get() {
            plan.dispose();
        }
    }
}

/// Move a plan's file location from `from` to `to` if it lived directly in
/// `from`. Returns whether it moved.
pub fn relocate_flight_plan(plan: &FlightPlanModel, from: &Path, to: &Path) -> bool {
    match plan.file().and_then(|file| relocated(&file, from, to)) {
        Some(file) => {
            plan.set_file_location(file);
            true
        }
        None => false,
    }
}

fn relocated(path: &Path, from: &Path, to: &Path) -> Option<PathBuf> {
    if path.parent() == Some(from) {
        path.file_name().map(|name| to.join(name))
    } else {
        None
    }
}

impl PartialEq for Mission {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Mission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mission")
            .field("name", &self.name())
            .field("directory", &self.directory())
            .field("flight_plans", &self.inner.flight_plans.len())
            .finish()
    }
}

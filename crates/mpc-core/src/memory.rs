//! In-memory reference implementation of [`FlightPlanDocument`].
//!
//! Plans are persisted as pretty-printed JSON in `.fml` files. The
//! recomputers never run anything on their own; results are handed in with
//! [`ManualRecomputer::publish`], which is how an external simulation engine
//! (or a test) feeds the model.

use crate::document::{
    AreaNode, DocumentEvent, DocumentListener, DocumentLoader, FlightPlanDocument,
    RecomputeListener, RecomputeReady, Recomputer, Statement, StatementKind, WaypointNode,
};
use crate::error::DocumentError;
use crate::models::{HardwareConfiguration, NodeId, Position};
use crate::simulation::{CoverageResult, SimulationResult};
use crate::subscription::{Listeners, Subscription};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Persisted content of a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct PlanData {
    name: String,
    notes: String,
    ref_point: Position,
    takeoff: Position,
    landing: Position,
    safety_altitude_m: f64,
    max_ground_speed_mps: f64,
    gsd_tolerance: f64,
    recalculate_on_every_change: bool,
    hardware: HardwareConfiguration,
    statements: Vec<Statement>,
    next_id: u64,
}

impl Default for PlanData {
    fn default() -> Self {
        Self {
            name: String::new(),
            notes: String::new(),
            ref_point: Position::default(),
            takeoff: Position::default(),
            landing: Position::default(),
            safety_altitude_m: 30.0,
            max_ground_speed_mps: 10.0,
            gsd_tolerance: 0.1,
            recalculate_on_every_change: true,
            hardware: HardwareConfiguration::default(),
            statements: Vec::new(),
            next_id: 1,
        }
    }
}

struct DocState {
    data: PlanData,
    file: Option<PathBuf>,
    changed: bool,
}

/// Flight plan document held entirely in memory.
pub struct InMemoryDocument {
    state: Mutex<DocState>,
    listeners: Listeners<DocumentEvent>,
    simulation: Arc<ManualRecomputer<SimulationResult>>,
    coverage: Arc<ManualRecomputer<CoverageResult>>,
    recalculations: AtomicU64,
}

impl InMemoryDocument {
    pub fn new(name: impl Into<String>) -> Self {
        let data = PlanData {
            name: name.into(),
            ..PlanData::default()
        };
        Self::from_data(data, None, false)
    }

    pub fn with_hardware(name: impl Into<String>, hardware: HardwareConfiguration) -> Self {
        let doc = Self::new(name);
        doc.state.lock().data.hardware = hardware;
        doc
    }

    /// Load a plan previously written by [`FlightPlanDocument::save`].
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let raw = std::fs::read_to_string(path).map_err(|e| DocumentError::io(path, e))?;
        let data: PlanData = serde_json::from_str(&raw).map_err(|source| DocumentError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_data(data, Some(path.to_path_buf()), false))
    }

    fn from_data(data: PlanData, file: Option<PathBuf>, changed: bool) -> Self {
        Self {
            state: Mutex::new(DocState {
                data,
                file,
                changed,
            }),
            listeners: Listeners::new(),
            simulation: Arc::new(ManualRecomputer::new()),
            coverage: Arc::new(ManualRecomputer::new()),
            recalculations: AtomicU64::new(0),
        }
    }

    /// Append a waypoint, at top level or inside `parent`.
    pub fn add_waypoint(
        &self,
        parent: Option<NodeId>,
        position: Position,
        camera_pitch_deg: f64,
    ) -> NodeId {
        self.insert(
            parent,
            StatementKind::Waypoint(WaypointNode {
                position,
                camera_pitch_deg,
            }),
        )
    }

    pub fn add_area(
        &self,
        name: impl Into<String>,
        corners: Vec<Position>,
        min_corners: usize,
    ) -> NodeId {
        self.insert(
            None,
            StatementKind::AreaOfInterest(AreaNode {
                name: name.into(),
                corners,
                min_corners,
            }),
        )
    }

    pub fn add_container(&self, parent: Option<NodeId>) -> NodeId {
        self.insert(parent, StatementKind::Container)
    }

    pub fn set_waypoint_position(&self, id: NodeId, position: Position) -> bool {
        let updated = {
            let mut state = self.state.lock();
            let updated = match find_mut(&mut state.data.statements, id) {
                Some(Statement {
                    kind: StatementKind::Waypoint(node),
                    ..
                }) if node.position != position => {
                    node.position = position;
                    true
                }
                _ => false,
            };
            if updated {
                state.changed = true;
            }
            updated
        };
        if updated {
            self.listeners.emit(&DocumentEvent::ValuesChanged);
        }
        updated
    }

    /// Reorder top-level statements as a single structural change.
    pub fn reorder(&self, order: &[NodeId]) {
        {
            let mut state = self.state.lock();
            let statements = &mut state.data.statements;
            statements.sort_by_key(|s| {
                order
                    .iter()
                    .position(|id| *id == s.id)
                    .unwrap_or(usize::MAX)
            });
            state.changed = true;
        }
        self.listeners.emit(&DocumentEvent::StructureChanged);
    }

    /// Forget unsaved edits without writing anything.
    pub fn mark_saved(&self) {
        self.state.lock().changed = false;
        self.listeners.emit(&DocumentEvent::ValuesChanged);
    }

    pub fn recalculation_count(&self) -> u64 {
        self.recalculations.load(Ordering::SeqCst)
    }

    pub fn simulation_engine(&self) -> Arc<ManualRecomputer<SimulationResult>> {
        Arc::clone(&self.simulation)
    }

    pub fn coverage_engine(&self) -> Arc<ManualRecomputer<CoverageResult>> {
        Arc::clone(&self.coverage)
    }

    fn insert(&self, parent: Option<NodeId>, kind: StatementKind) -> NodeId {
        let id = {
            let mut state = self.state.lock();
            let id = NodeId(state.data.next_id);
            state.data.next_id += 1;
            let statement = Statement::new(id, kind);
            match parent.and_then(|parent| find_mut(&mut state.data.statements, parent)) {
                Some(parent) => parent.children.push(statement),
                None => state.data.statements.push(statement),
            }
            state.changed = true;
            id
        };
        self.listeners.emit(&DocumentEvent::ElementAdded(id));
        id
    }

    /// Apply `edit`; when it reports a change, mark dirty and notify.
    fn update(&self, edit: impl FnOnce(&mut PlanData) -> bool) {
        let changed = {
            let mut state = self.state.lock();
            let changed = edit(&mut state.data);
            if changed {
                state.changed = true;
            }
            changed
        };
        if changed {
            self.listeners.emit(&DocumentEvent::ValuesChanged);
        }
    }

    fn read<R>(&self, f: impl FnOnce(&PlanData) -> R) -> R {
        f(&self.state.lock().data)
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

fn find_mut(statements: &mut [Statement], id: NodeId) -> Option<&mut Statement> {
    for statement in statements.iter_mut() {
        if statement.id == id {
            return Some(statement);
        }
        if let Some(found) = find_mut(&mut statement.children, id) {
            return Some(found);
        }
    }
    None
}

fn remove_node(statements: &mut Vec<Statement>, id: NodeId) -> bool {
    if let Some(index) = statements.iter().position(|s| s.id == id) {
        statements.remove(index);
        return true;
    }
    statements
        .iter_mut()
        .any(|statement| remove_node(&mut statement.children, id))
}

fn all_areas<'a>(statements: &'a [Statement], out: &mut Vec<&'a AreaNode>) {
    for statement in statements {
        if let StatementKind::AreaOfInterest(area) = &statement.kind {
            out.push(area);
        }
        all_areas(&statement.children, out);
    }
}

/// Largest polygon the engine accepts, in corner count.
const MAX_AREA_CORNERS: usize = 1_000;

impl FlightPlanDocument for InMemoryDocument {
    fn name(&self) -> String {
        self.read(|d| d.name.clone())
    }

    fn set_name(&self, name: String) {
        self.update(|d| replace(&mut d.name, name));
    }

    fn notes(&self) -> String {
        self.read(|d| d.notes.clone())
    }

    fn set_notes(&self, notes: String) {
        self.update(|d| replace(&mut d.notes, notes));
    }

    fn file(&self) -> Option<PathBuf> {
        self.state.lock().file.clone()
    }

    fn set_file(&self, file: Option<PathBuf>) {
        let changed = {
            let mut state = self.state.lock();
            replace(&mut state.file, file)
        };
        if changed {
            self.listeners.emit(&DocumentEvent::ValuesChanged);
        }
    }

    fn ref_point(&self) -> Position {
        self.read(|d| d.ref_point)
    }

    fn set_ref_point(&self, position: Position) {
        self.update(|d| replace(&mut d.ref_point, position));
    }

    fn takeoff(&self) -> Position {
        self.read(|d| d.takeoff)
    }

    fn set_takeoff(&self, position: Position) {
        self.update(|d| replace(&mut d.takeoff, position));
    }

    fn landing(&self) -> Position {
        self.read(|d| d.landing)
    }

    fn set_landing(&self, position: Position) {
        self.update(|d| replace(&mut d.landing, position));
    }

    fn safety_altitude_m(&self) -> f64 {
        self.read(|d| d.safety_altitude_m)
    }

    fn set_safety_altitude_m(&self, altitude: f64) {
        self.update(|d| replace(&mut d.safety_altitude_m, altitude.max(0.0)));
    }

    fn max_ground_speed_mps(&self) -> f64 {
        self.read(|d| d.max_ground_speed_mps)
    }

    fn set_max_ground_speed_mps(&self, speed: f64) {
        self.update(|d| replace(&mut d.max_ground_speed_mps, speed.max(0.0)));
    }

    fn gsd_tolerance(&self) -> f64 {
        self.read(|d| d.gsd_tolerance)
    }

    fn set_gsd_tolerance(&self, tolerance: f64) {
        self.update(|d| replace(&mut d.gsd_tolerance, tolerance));
    }

    fn recalculate_on_every_change(&self) -> bool {
        self.read(|d| d.recalculate_on_every_change)
    }

    fn set_recalculate_on_every_change(&self, enabled: bool) {
        self.update(|d| replace(&mut d.recalculate_on_every_change, enabled));
    }

    fn is_changed(&self) -> bool {
        self.state.lock().changed
    }

    fn all_aois_size_valid(&self) -> bool {
        self.read(|d| {
            let mut areas = Vec::new();
            all_areas(&d.statements, &mut areas);
            areas.iter().all(|area| area.corners.len() <= MAX_AREA_CORNERS)
        })
    }

    fn hardware(&self) -> HardwareConfiguration {
        self.read(|d| d.hardware.clone())
    }

    fn statements(&self) -> Vec<Statement> {
        self.read(|d| d.statements.clone())
    }

    fn remove_statement(&self, id: NodeId) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let removed = remove_node(&mut state.data.statements, id);
            if removed {
                state.changed = true;
            }
            removed
        };
        if removed {
            self.listeners.emit(&DocumentEvent::ElementRemoved(id));
        }
        removed
    }

    fn add_change_listener(&self, listener: DocumentListener) -> Subscription {
        self.listeners.add_boxed(Arc::from(listener))
    }

    fn simulation(&self) -> Arc<dyn Recomputer<SimulationResult>> {
        self.simulation.clone()
    }

    fn coverage(&self) -> Arc<dyn Recomputer<CoverageResult>> {
        self.coverage.clone()
    }

    fn recalculate(&self) {
        self.recalculations.fetch_add(1, Ordering::SeqCst);
        self.simulation.request();
        self.coverage.request();
    }

    fn save(&self) -> Result<(), DocumentError> {
        {
            let mut state = self.state.lock();
            let path = state.file.clone().ok_or(DocumentError::NoFile)?;
            write_plan(&state.data, &path)?;
            state.changed = false;
        }
        self.listeners.emit(&DocumentEvent::ValuesChanged);
        Ok(())
    }

    fn save_copy(&self, path: &Path) -> Result<(), DocumentError> {
        let data = self.read(PlanData::clone);
        write_plan(&data, path)
    }
}

fn write_plan(data: &PlanData, path: &Path) -> Result<(), DocumentError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DocumentError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(data).map_err(|source| DocumentError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|e| DocumentError::io(path, e))
}

/// Loader for `.fml` files written by [`InMemoryDocument`].
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDocumentLoader;

impl DocumentLoader for JsonDocumentLoader {
    fn open(&self, path: &Path) -> Result<Arc<dyn FlightPlanDocument>, DocumentError> {
        Ok(Arc::new(InMemoryDocument::open(path)?))
    }
}

/// Recomputer whose results are supplied from outside.
pub struct ManualRecomputer<T> {
    latest: Mutex<Option<Arc<T>>>,
    listeners: Listeners<RecomputeReady<T>>,
    runs: AtomicU64,
    pending: AtomicBool,
}

impl<T: Send + Sync + 'static> ManualRecomputer<T> {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            listeners: Listeners::new(),
            runs: AtomicU64::new(0),
            pending: AtomicBool::new(false),
        }
    }

    /// Mark a run as requested.
    pub fn request(&self) {
        self.pending.store(true, Ordering::SeqCst);
    }

    /// Deliver a finished run to every listener on the calling thread.
    pub fn publish(&self, result: T, another_pending: bool) -> u64 {
        let run_no = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        let result = Arc::new(result);
        *self.latest.lock() = Some(Arc::clone(&result));
        self.pending.store(another_pending, Ordering::SeqCst);
        self.listeners.emit(&RecomputeReady {
            result,
            another_pending,
            run_no,
        });
        run_no
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<T: Send + Sync + 'static> Default for ManualRecomputer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Recomputer<T> for ManualRecomputer<T> {
    fn add_recompute_listener(&self, listener: RecomputeListener<T>) -> Subscription {
        self.listeners.add_boxed(Arc::from(listener))
    }

    fn latest(&self) -> Option<Arc<T>> {
        self.latest.lock().clone()
    }

    fn is_recompute_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }
}

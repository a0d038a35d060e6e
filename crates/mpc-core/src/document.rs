//! Interfaces of the backing flight plan document and its recomputers.
//!
//! The document is the source of truth; models only observe it. Documents
//! are not required to be internally consistent across threads, so callers
//! mutate them from the UI context or a session task only.

use crate::error::DocumentError;
use crate::models::{HardwareConfiguration, NodeId, Position};
use crate::simulation::{CoverageResult, SimulationResult};
use crate::subscription::Subscription;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Change notification emitted by a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEvent {
    ValuesChanged,
    StructureChanged,
    ElementAdded(NodeId),
    ElementRemoved(NodeId),
}

impl DocumentEvent {
    /// Structural events change the statement tree, not just values.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::ValuesChanged)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointNode {
    pub position: Position,
    #[serde(default)]
    pub camera_pitch_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaNode {
    pub name: String,
    pub corners: Vec<Position>,
    pub min_corners: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatementKind {
    Waypoint(WaypointNode),
    AreaOfInterest(AreaNode),
    Container,
    Other { label: String },
}

/// Node of the document's statement tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub id: NodeId,
    pub kind: StatementKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Statement>,
}

impl Statement {
    pub fn new(id: NodeId, kind: StatementKind) -> Self {
        Self {
            id,
            kind,
            children: Vec::new(),
        }
    }

    /// Depth-first, pre-order traversal.
    pub fn walk<F: FnMut(&Statement)>(&self, visit: &mut F) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Notification that a recomputer finished a run.
#[derive(Debug)]
pub struct RecomputeReady<T> {
    pub result: Arc<T>,
    /// Another run was requested while this one was in progress
    pub another_pending: bool,
    pub run_no: u64,
}

impl<T> Clone for RecomputeReady<T> {
    fn clone(&self) -> Self {
        Self {
            result: Arc::clone(&self.result),
            another_pending: self.another_pending,
            run_no: self.run_no,
        }
    }
}

pub type RecomputeListener<T> = Box<dyn Fn(&RecomputeReady<T>) + Send + Sync>;

/// Background computation attached to a document.
///
/// Listeners are called on the recomputer's own thread.
pub trait Recomputer<T>: Send + Sync {
    fn add_recompute_listener(&self, listener: RecomputeListener<T>) -> Subscription;

    /// Result of the last finished run, if any.
    fn latest(&self) -> Option<Arc<T>>;

    fn is_recompute_pending(&self) -> bool;
}

pub type DocumentListener = Box<dyn Fn(&DocumentEvent) + Send + Sync>;

/// Mutable flight plan document.
pub trait FlightPlanDocument: Send + Sync {
    fn name(&self) -> String;
    fn set_name(&self, name: String);

    fn notes(&self) -> String;
    fn set_notes(&self, notes: String);

    fn file(&self) -> Option<PathBuf>;
    fn set_file(&self, file: Option<PathBuf>);

    fn ref_point(&self) -> Position;
    fn set_ref_point(&self, position: Position);

    fn takeoff(&self) -> Position;
    fn set_takeoff(&self, position: Position);

    fn landing(&self) -> Position;
    fn set_landing(&self, position: Position);

    fn safety_altitude_m(&self) -> f64;
    fn set_safety_altitude_m(&self, altitude: f64);

    fn max_ground_speed_mps(&self) -> f64;
    fn set_max_ground_speed_mps(&self, speed: f64);

    fn gsd_tolerance(&self) -> f64;
    fn set_gsd_tolerance(&self, tolerance: f64);

    fn recalculate_on_every_change(&self) -> bool;
    fn set_recalculate_on_every_change(&self, enabled: bool);

    /// Dirty bit: true while there are unsaved edits.
    fn is_changed(&self) -> bool;

    /// Whether every area of interest is within the engine's size limits.
    fn all_aois_size_valid(&self) -> bool;

    fn hardware(&self) -> HardwareConfiguration;

    /// Snapshot of the top-level statements in flight order.
    fn statements(&self) -> Vec<Statement>;

    /// Detach a statement anywhere in the tree. Returns whether it existed.
    fn remove_statement(&self, id: NodeId) -> bool;

    fn add_change_listener(&self, listener: DocumentListener) -> Subscription;

    fn simulation(&self) -> Arc<dyn Recomputer<SimulationResult>>;

    fn coverage(&self) -> Arc<dyn Recomputer<CoverageResult>>;

    /// Request a new simulation and coverage run.
    fn recalculate(&self);

    /// Persist to [`FlightPlanDocument::file`].
    fn save(&self) -> Result<(), DocumentError>;

    /// Write the plan to `path`, keeping the file location and dirty bit.
    fn save_copy(&self, path: &Path) -> Result<(), DocumentError>;
}

/// Opens documents from disk.
pub trait DocumentLoader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Arc<dyn FlightPlanDocument>, DocumentError>;
}

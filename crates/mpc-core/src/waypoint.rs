//! Derived waypoint view.

use crate::document::WaypointNode;
use crate::models::{NodeId, Position};
use crate::property::Property;
use crate::warnings::WaypointWarnings;

/// A waypoint as shown to the user.
///
/// Position and pitch are a snapshot taken when the list was rebuilt; the
/// warning cells are live and are written by simulation results and
/// validation.
#[derive(Debug, Clone)]
pub struct WayPoint {
    node: NodeId,
    index: usize,
    position: Position,
    camera_pitch_deg: f64,
    airspace_warning: Property<bool>,
    height_warning: Property<bool>,
    ground_distance_m: Property<Option<f64>>,
}

impl WayPoint {
    /// `index` is 1-based, in flight order.
    pub fn new(node: NodeId, source: &WaypointNode, index: usize) -> Self {
        Self {
            node,
            index,
            position: source.position,
            camera_pitch_deg: source.camera_pitch_deg,
            airspace_warning: Property::new(false),
            height_warning: Property::new(false),
            ground_distance_m: Property::new(None),
        }
    }

    /// Backing statement, used only to match simulation samples.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn camera_pitch_deg(&self) -> f64 {
        self.camera_pitch_deg
    }

    pub fn airspace_warning(&self) -> &Property<bool> {
        &self.airspace_warning
    }

    pub fn height_warning(&self) -> &Property<bool> {
        &self.height_warning
    }

    pub fn ground_distance_m(&self) -> &Property<Option<f64>> {
        &self.ground_distance_m
    }

    pub fn clear_warnings(&self) {
        self.apply(&WaypointWarnings::default());
    }

    pub fn warnings(&self) -> WaypointWarnings {
        WaypointWarnings {
            airspace_warning: self.airspace_warning.get(),
            height_warning: self.height_warning.get(),
            ground_distance_m: self.ground_distance_m.get(),
        }
    }

    pub fn apply(&self, warnings: &WaypointWarnings) {
        self.airspace_warning.set(warnings.airspace_warning);
        self.height_warning.set(warnings.height_warning);
        self.ground_distance_m.set(warnings.ground_distance_m);
    }
}

impl PartialEq for WayPoint {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.index == other.index && self.position == other.position
    }
}

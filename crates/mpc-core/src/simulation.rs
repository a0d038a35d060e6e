//! Results delivered by the flight simulation engine.

use crate::models::{GsdRange, NodeId};
use serde::{Deserialize, Serialize};

/// One distance sample along the simulated flight path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimDistance {
    /// Statement the sample belongs to (the leg heading towards it)
    pub heading: NodeId,
    /// Clearance above terrain in meters
    pub ground_distance_m: f64,
    /// Clearance to the nearest restricted airspace in meters; negative
    /// means the path is inside it
    pub airspace_distance_m: f64,
    /// Names of areas of interest the sample collides with
    #[serde(default)]
    pub aoi_collisions: Vec<String>,
}

impl SimDistance {
    pub fn new(heading: NodeId, ground_distance_m: f64, airspace_distance_m: f64) -> Self {
        Self {
            heading,
            ground_distance_m,
            airspace_distance_m,
            aoi_collisions: Vec::new(),
        }
    }

    pub fn with_collision(mut self, area: impl Into<String>) -> Self {
        self.aoi_collisions.push(area.into());
        self
    }
}

/// Complete output of one simulation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub samples: Vec<SimDistance>,
    /// First flight plan object of the run
    pub first_heading: Option<NodeId>,
    pub simulated_time_valid: bool,
}

impl SimulationResult {
    /// Whether `sample` belongs to the first object of the run.
    pub fn is_first_object(&self, sample: &SimDistance) -> bool {
        self.first_heading == Some(sample.heading)
    }
}

/// Output of the coverage computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageResult {
    pub gsd_mismatch: GsdRange,
}

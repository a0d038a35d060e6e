//! Core data models for the mission planner.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic position (WGS84 degrees, altitude in meters).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub alt_m: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64, alt_m: f64) -> Self {
        Self { lat, lon, alt_m }
    }
}

/// Identity of a statement in a backing flight plan document.
///
/// Only used for matching; holding a `NodeId` does not keep the node alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Range of ground sample distances (cm/px) where the planned GSD
/// deviates from the requested one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GsdRange {
    pub min: f64,
    pub max: f64,
}

impl GsdRange {
    pub fn is_empty(&self) -> bool {
        self.max <= self.min
    }
}

/// Airframe limits relevant to planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformDescription {
    pub name: String,
    /// Minimum clearance above ground in meters
    pub min_ground_distance_m: f64,
    /// Minimum distance between consecutive waypoints (0 disables)
    pub min_waypoint_separation_m: f64,
    /// Maximum distance between consecutive waypoints (0 disables)
    pub max_waypoint_separation_m: f64,
    #[serde(default)]
    pub obstacle_avoidance_capable: bool,
}

impl Default for PlatformDescription {
    fn default() -> Self {
        Self {
            name: "Generic multicopter".to_string(),
            min_ground_distance_m: 10.0,
            min_waypoint_separation_m: 0.0,
            max_waypoint_separation_m: 0.0,
            obstacle_avoidance_capable: false,
        }
    }
}

/// A camera or sensor mounted on a gimbal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadDescription {
    pub name: String,
    pub min_pitch_deg: f64,
    pub max_pitch_deg: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadMount {
    pub payloads: Vec<PayloadDescription>,
}

/// Platform plus payload setup a flight plan is made for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareConfiguration {
    pub platform: PlatformDescription,
    #[serde(default)]
    pub payload_mounts: Vec<PayloadMount>,
}

impl HardwareConfiguration {
    /// Iterate every payload over every mount.
    pub fn payloads(&self) -> impl Iterator<Item = &PayloadDescription> {
        self.payload_mounts.iter().flat_map(|mount| mount.payloads.iter())
    }
}

/// Area of interest as seen by the flight plan model.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    pub node: NodeId,
    pub name: String,
    pub corners: Vec<Position>,
    pub min_corners: usize,
}

impl AreaOfInterest {
    pub fn has_enough_corners(&self) -> bool {
        self.corners.len() >= self.min_corners
    }
}

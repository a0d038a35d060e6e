//! Post-hoc checks over a materialized waypoint list.
//!
//! Both checks only ever raise the airspace-warning flag of offending
//! waypoints; clearing is left to the next simulation result.

use crate::flight_plan::FlightPlanModel;
use crate::models::{HardwareConfiguration, PlatformDescription};
use crate::spatial::distance_3d;
use crate::waypoint::WayPoint;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Allowed distance between consecutive waypoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeparationLimits {
    /// Minimum distance in meters (0 disables)
    pub min_m: f64,
    /// Maximum distance in meters (0 disables)
    pub max_m: f64,
}

impl SeparationLimits {
    pub fn from_platform(platform: &PlatformDescription) -> Self {
        Self {
            min_m: platform.min_waypoint_separation_m,
            max_m: platform.max_waypoint_separation_m,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.min_m == 0.0 && self.max_m == 0.0
    }
}

/// Outcome of running every check on one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    pub gimbal_ok: bool,
    pub separation_ok: bool,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.gimbal_ok && self.separation_ok
    }
}

/// Flag every waypoint whose camera pitch is outside the range of any
/// mounted payload. Returns whether all waypoints are within range.
pub fn check_gimbal_pitch(hardware: &HardwareConfiguration, waypoints: &[WayPoint]) -> bool {
    let mut ok = true;
    for payload in hardware.payloads() {
        for waypoint in waypoints {
            let pitch = waypoint.camera_pitch_deg();
            if pitch < payload.min_pitch_deg || pitch > payload.max_pitch_deg {
                debug!(
                    waypoint = waypoint.index(),
                    pitch,
                    payload = %payload.name,
                    "camera pitch outside gimbal range"
                );
                waypoint.airspace_warning().set(true);
                ok = false;
            }
        }
    }
    ok
}

/// Flag the later waypoint of every consecutive pair that is too close or
/// too far apart. Returns whether all pairs are within limits.
pub fn check_waypoint_separation(limits: &SeparationLimits, waypoints: &[WayPoint]) -> bool {
    if limits.is_disabled() {
        return true;
    }

    let mut ok = true;
    for pair in waypoints.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        let distance = distance_3d(&previous.position(), &current.position());
        let too_close = limits.min_m > 0.0 && distance < limits.min_m;
        let too_far = limits.max_m > 0.0 && distance > limits.max_m;
        if too_close || too_far {
            debug!(
                waypoint = current.index(),
                distance_m = distance,
                "waypoint separation out of limits"
            );
            current.airspace_warning().set(true);
            ok = false;
        }
    }
    ok
}

/// Run both checks against the plan's hardware configuration.
pub fn validate_flight_plan(plan: &FlightPlanModel) -> ValidationReport {
    let hardware = plan.hardware();
    let waypoints = plan.waypoints().get();
    let limits = SeparationLimits::from_platform(&hardware.platform);

    ValidationReport {
        gimbal_ok: check_gimbal_pitch(&hardware, &waypoints),
        separation_ok: check_waypoint_separation(&limits, &waypoints),
    }
}

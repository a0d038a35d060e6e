//! Per-waypoint safety warnings derived from simulation results.
//!
//! Simulation samples and waypoints are joined positionally: samples arrive
//! grouped by the statement they head towards, in flight order, and a cursor
//! walks the waypoint list forward to find each group's waypoint. The two
//! sequences are produced independently (a structural edit can land between
//! a simulation run and its delivery), so when a group has no waypoint left
//! to match, evaluation stops and nothing past that point is written.

use crate::models::NodeId;
use crate::simulation::SimulationResult;
use serde::{Deserialize, Serialize};

/// Warning state of a single waypoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaypointWarnings {
    pub airspace_warning: bool,
    pub height_warning: bool,
    pub ground_distance_m: Option<f64>,
}

/// Thresholds used by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarningParams {
    /// Platform minimum clearance above ground in meters
    pub min_ground_distance_m: f64,
    /// Whether airspace data counts towards warnings
    pub use_airspace_data_for_planning: bool,
}

impl Default for WarningParams {
    fn default() -> Self {
        Self {
            min_ground_distance_m: 10.0,
            use_airspace_data_for_planning: true,
        }
    }
}

/// How far an evaluation got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationOutcome {
    /// Every sample was matched to a waypoint.
    Complete,
    /// The sample at `sample_index` had no matching waypoint ahead of the
    /// cursor; it and everything after it were ignored.
    Desynchronized { sample_index: usize },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WaypointWarningEvaluator {
    params: WarningParams,
}

impl WaypointWarningEvaluator {
    pub fn new(params: WarningParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &WarningParams {
        &self.params
    }

    /// Fold `result` into `state`.
    ///
    /// `keys[i]` is the backing statement of waypoint `i` and `state[i]` its
    /// warnings. Entries never matched by a sample are left untouched.
    pub fn evaluate(
        &self,
        result: &SimulationResult,
        keys: &[NodeId],
        state: &mut [WaypointWarnings],
    ) -> EvaluationOutcome {
        debug_assert_eq!(keys.len(), state.len());
        let len = keys.len().min(state.len());

        let mut cursor = 0;
        let mut last_heading: Option<NodeId> = None;
        let mut target: Option<usize> = None;
        let mut min_ground: Option<f64> = None;

        for (sample_index, sample) in result.samples.iter().enumerate() {
            if last_heading != Some(sample.heading) {
                flush(state, target, min_ground);
                min_ground = None;
                last_heading = Some(sample.heading);
                target = None;
                while cursor < len {
                    let candidate = cursor;
                    cursor += 1;
                    if keys[candidate] == sample.heading {
                        target = Some(candidate);
                        break;
                    }
                }
            }

            let Some(index) = target else {
                return EvaluationOutcome::Desynchronized { sample_index };
            };
            let warnings = &mut state[index];
            let first_object = result.is_first_object(sample);

            let airspace_hit =
                !sample.aoi_collisions.is_empty() || sample.airspace_distance_m < 0.0;
            if self.params.use_airspace_data_for_planning && airspace_hit {
                warnings.airspace_warning = true;
            } else if first_object {
                warnings.airspace_warning = false;
            }

            let distance = sample.ground_distance_m;
            if first_object || min_ground.map_or(true, |min| min > distance) {
                min_ground = Some(distance);
                warnings.height_warning = distance < self.params.min_ground_distance_m;
            }
        }

        flush(state, target, min_ground);
        EvaluationOutcome::Complete
    }
}

fn flush(state: &mut [WaypointWarnings], target: Option<usize>, min_ground: Option<f64>) {
    if let (Some(index), Some(min)) = (target, min_ground) {
        state[index].ground_distance_m = Some(min);
    }
}

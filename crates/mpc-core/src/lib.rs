pub mod dispatcher;
pub mod document;
pub mod error;
pub mod flight_plan;
pub mod memory;
pub mod models;
pub mod property;
pub mod settings;
pub mod simulation;
pub mod spatial;
pub mod subscription;
pub mod sync;
pub mod validation;
pub mod warnings;
pub mod waypoint;

pub use dispatcher::{ui_context, UiContext, UiLoop};
pub use document::{
    AreaNode, DocumentEvent, DocumentLoader, FlightPlanDocument, RecomputeReady, Recomputer,
    Statement, StatementKind, WaypointNode,
};
pub use error::{DispatchError, DocumentError};
pub use flight_plan::{FlightPlanFields, FlightPlanModel};
pub use memory::{InMemoryDocument, JsonDocumentLoader, ManualRecomputer};
pub use models::{
    AreaOfInterest, GsdRange, HardwareConfiguration, NodeId, PayloadDescription, PayloadMount,
    PlatformDescription, Position,
};
pub use property::{ListChange, ListProperty, Property};
pub use settings::{PlanningContext, PlanningSettings};
pub use simulation::{CoverageResult, SimDistance, SimulationResult};
pub use subscription::{Subscription, SubscriptionSet};
pub use sync::FieldSynchronizer;
pub use validation::{
    check_gimbal_pitch, check_waypoint_separation, validate_flight_plan, SeparationLimits,
    ValidationReport,
};
pub use warnings::{EvaluationOutcome, WarningParams, WaypointWarningEvaluator, WaypointWarnings};
pub use waypoint::WayPoint;

//! Application settings read by flight plan models.

use crate::dispatcher::UiContext;
use crate::property::Property;

/// Planning preferences shared by every open flight plan.
#[derive(Debug, Clone)]
pub struct PlanningSettings {
    use_airspace_data_for_planning: Property<bool>,
}

impl PlanningSettings {
    pub fn new(use_airspace_data_for_planning: bool) -> Self {
        Self {
            use_airspace_data_for_planning: Property::new(use_airspace_data_for_planning),
        }
    }

    pub fn use_airspace_data_for_planning(&self) -> &Property<bool> {
        &self.use_airspace_data_for_planning
    }
}

impl Default for PlanningSettings {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Collaborators handed to every [`crate::FlightPlanModel`].
#[derive(Debug, Clone)]
pub struct PlanningContext {
    pub ui: UiContext,
    pub settings: PlanningSettings,
}

impl PlanningContext {
    pub fn new(ui: UiContext, settings: PlanningSettings) -> Self {
        Self { ui, settings }
    }
}

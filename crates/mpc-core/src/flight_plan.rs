//! Reactive model of one flight plan.
//!
//! A [`FlightPlanModel`] mirrors its backing document through a
//! [`FieldSynchronizer`] and derives the waypoint list from the document's
//! statement tree. Document notifications and recompute results are routed
//! through the UI context before any cell is written.

use crate::dispatcher::UiContext;
use crate::document::{DocumentEvent, FlightPlanDocument, RecomputeReady, StatementKind};
use crate::error::DocumentError;
use crate::models::{AreaOfInterest, GsdRange, HardwareConfiguration, NodeId, Position};
use crate::property::{ListChange, ListProperty, Property};
use crate::settings::{PlanningContext, PlanningSettings};
use crate::simulation::{CoverageResult, SimulationResult};
use crate::subscription::SubscriptionSet;
use crate::sync::FieldSynchronizer;
use crate::warnings::{
    EvaluationOutcome, WarningParams, WaypointWarningEvaluator, WaypointWarnings,
};
use crate::waypoint::WayPoint;
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Cells mirrored from the backing document.
#[derive(Debug, Default)]
pub struct FlightPlanFields {
    pub name: Property<String>,
    pub notes: Property<String>,
    pub file: Property<Option<PathBuf>>,
    pub ref_point: Property<Position>,
    pub takeoff: Property<Position>,
    pub landing: Property<Position>,
    pub safety_altitude_m: Property<f64>,
    pub max_ground_speed_mps: Property<f64>,
    pub gsd_tolerance: Property<f64>,
    pub recalculate_on_every_change: Property<bool>,
    /// Read-only: the document's dirty bit
    pub has_unsaved_changes: Property<bool>,
    /// Read-only
    pub all_aois_size_valid: Property<bool>,
    /// Read-only: taken from the platform description
    pub obstacle_avoidance_capable: Property<bool>,
}

struct Inner {
    document: Arc<dyn FlightPlanDocument>,
    is_template: bool,
    ui: UiContext,
    settings: PlanningSettings,
    sync: FieldSynchronizer<dyn FlightPlanDocument>,
    fields: FlightPlanFields,
    waypoints: ListProperty<WayPoint>,
    areas_of_interest: ListProperty<AreaOfInterest>,
    all_aois_valid: Property<bool>,
    saveable: Property<bool>,
    is_name_set: Property<bool>,
    gsd_mismatch: Property<GsdRange>,
    simulated_time_valid: Property<bool>,
    /// Set once existing areas of interest were imported
    loaded: AtomicBool,
    disposed: AtomicBool,
    subscriptions: Mutex<SubscriptionSet>,
}

/// Observable view of one flight plan document.
///
/// Clones share the same model.
#[derive(Clone)]
pub struct FlightPlanModel {
    inner: Arc<Inner>,
}

impl FlightPlanModel {
    /// Build the model and start listening to `document`.
    ///
    /// Templates never receive simulation results.
    pub fn new(
        document: Arc<dyn FlightPlanDocument>,
        is_template: bool,
        context: &PlanningContext,
    ) -> Self {
        let is_name_set = document.file().is_some();
        let inner = Arc::new(Inner {
            sync: FieldSynchronizer::new(Arc::clone(&document)),
            document,
            is_template,
            ui: context.ui.clone(),
            settings: context.settings.clone(),
            fields: FlightPlanFields::default(),
            waypoints: ListProperty::new(),
            areas_of_interest: ListProperty::new(),
            all_aois_valid: Property::new(true),
            saveable: Property::new(false),
            is_name_set: Property::new(is_name_set),
            gsd_mismatch: Property::default(),
            simulated_time_valid: Property::new(false),
            loaded: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            subscriptions: Mutex::new(SubscriptionSet::default()),
        });

        inner.bind_fields();
        Inner::wire(&inner);
        inner.update_properties();
        inner.rebuild_waypoints();

        Self { inner }
    }

    pub fn document(&self) -> &Arc<dyn FlightPlanDocument> {
        &self.inner.document
    }

    pub fn is_template(&self) -> bool {
        self.inner.is_template
    }

    pub fn fields(&self) -> &FlightPlanFields {
        &self.inner.fields
    }

    /// Flight-ordered waypoints, rebuilt on every structural change.
    pub fn waypoints(&self) -> &ListProperty<WayPoint> {
        &self.inner.waypoints
    }

    pub fn areas_of_interest(&self) -> &ListProperty<AreaOfInterest> {
        &self.inner.areas_of_interest
    }

    pub fn all_aois_valid(&self) -> &Property<bool> {
        &self.inner.all_aois_valid
    }

    pub fn saveable(&self) -> &Property<bool> {
        &self.inner.saveable
    }

    pub fn is_name_set(&self) -> &Property<bool> {
        &self.inner.is_name_set
    }

    pub fn gsd_mismatch(&self) -> &Property<GsdRange> {
        &self.inner.gsd_mismatch
    }

    pub fn simulated_time_valid(&self) -> &Property<bool> {
        &self.inner.simulated_time_valid
    }

    pub fn name(&self) -> String {
        self.inner.fields.name.get()
    }

    pub fn file(&self) -> Option<PathBuf> {
        self.inner.fields.file.get()
    }

    pub fn hardware(&self) -> HardwareConfiguration {
        self.inner.document.hardware()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.inner.fields.has_unsaved_changes.get()
    }

    pub fn can_be_saved(&self) -> bool {
        self.inner.saveable.get()
    }

    /// Pull every synchronized field again.
    pub fn refresh(&self) {
        self.inner.update_properties();
    }

    /// Rename the plan; the name is pushed to the document.
    pub fn rename(&self, name: impl Into<String>) {
        self.inner.fields.name.set(name.into());
        self.inner.is_name_set.set(true);
    }

    /// Point the plan at a new file without writing it.
    pub fn set_file_location(&self, file: PathBuf) {
        self.inner.fields.file.set(Some(file));
    }

    /// Detach the given waypoints from the document. Returns how many existed.
    pub fn delete_waypoints(&self, nodes: &[NodeId]) -> usize {
        nodes
            .iter()
            .filter(|node| self.inner.document.remove_statement(**node))
            .count()
    }

    pub fn remove_area_of_interest(&self, node: NodeId) -> bool {
        !self
            .inner
            .areas_of_interest
            .remove_if(|area| area.node == node)
            .is_empty()
    }

    pub fn recalculate(&self) {
        self.inner.document.recalculate();
    }

    /// Write the document to its file location.
    pub fn save(&self) -> Result<(), DocumentError> {
        self.inner.document.save()?;
        self.inner.is_name_set.set(true);
        self.inner.sync.refresh();
        Ok(())
    }

    /// Write the plan to `path` without adopting it as the plan's file.
    pub fn save_copy(&self, path: &Path) -> Result<(), DocumentError> {
        self.inner.document.save_copy(path)
    }

    /// Release every listener. The model stops tracking its document.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.sync.dispose();
        self.inner.subscriptions.lock().dispose_all();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

impl PartialEq for FlightPlanModel {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for FlightPlanModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightPlanModel")
            .field("name", &self.name())
            .field("file", &self.file())
            .field("is_template", &self.inner.is_template)
            .field("waypoints", &self.inner.waypoints.len())
            .finish()
    }
}

impl Inner {
    fn bind_fields(&self) {
        let f = &self.fields;
        let s = &self.sync;

        s.bind(&f.name).two_way(|d| d.name(), |d, v| d.set_name(v));
        s.bind(&f.notes).two_way(|d| d.notes(), |d, v| d.set_notes(v));
        s.bind(&f.file).two_way(|d| d.file(), |d, v| d.set_file(v));
        s.bind(&f.ref_point)
            .two_way(|d| d.ref_point(), |d, v| d.set_ref_point(v));
        s.bind(&f.takeoff)
            .two_way(|d| d.takeoff(), |d, v| d.set_takeoff(v));
        s.bind(&f.landing)
            .two_way(|d| d.landing(), |d, v| d.set_landing(v));
        s.bind(&f.safety_altitude_m)
            .two_way(|d| d.safety_altitude_m(), |d, v| d.set_safety_altitude_m(v));
        s.bind(&f.max_ground_speed_mps)
            .two_way(|d| d.max_ground_speed_mps(), |d, v| d.set_max_ground_speed_mps(v));
        s.bind(&f.gsd_tolerance)
            .two_way(|d| d.gsd_tolerance(), |d, v| d.set_gsd_tolerance(v));
        s.bind(&f.recalculate_on_every_change).two_way(
            |d| d.recalculate_on_every_change(),
            |d, v| d.set_recalculate_on_every_change(v),
        );

        s.bind(&f.has_unsaved_changes).to(|d| d.is_changed());
        s.bind(&f.all_aois_size_valid)
            .to(|d| d.all_aois_size_valid());
        s.bind(&f.obstacle_avoidance_capable)
            .to(|d| d.hardware().platform.obstacle_avoidance_capable);
    }

    fn wire(inner: &Arc<Inner>) {
        let weak = Arc::downgrade(inner);
        let mut subscriptions = SubscriptionSet::default();

        let target = weak.clone();
        subscriptions.push(inner.areas_of_interest.add_listener(move |change| {
            if let Some(inner) = target.upgrade() {
                inner.on_areas_changed(change);
            }
        }));

        let target = weak.clone();
        let ui = inner.ui.clone();
        subscriptions.push(inner.document.add_change_listener(Box::new(
            move |event: &DocumentEvent| {
                let event = *event;
                let target = target.clone();
                ui.run(move || {
                    if let Some(inner) = target.upgrade() {
                        inner.on_document_event(event);
                    }
                });
            },
        )));

        if !inner.is_template {
            let target = weak.clone();
            let ui = inner.ui.clone();
            subscriptions.push(inner.document.simulation().add_recompute_listener(Box::new(
                move |ready: &RecomputeReady<SimulationResult>| {
                    if ready.another_pending {
                        debug!(run = ready.run_no, "skipping superseded simulation result");
                        return;
                    }
                    let result = Arc::clone(&ready.result);
                    let target = target.clone();
                    ui.post(move || {
                        if let Some(inner) = target.upgrade() {
                            inner.on_simulation_result(&result);
                        }
                    });
                },
            )));
        }

        let target = weak.clone();
        let ui = inner.ui.clone();
        subscriptions.push(inner.document.coverage().add_recompute_listener(Box::new(
            move |ready: &RecomputeReady<CoverageResult>| {
                let range = ready.result.gsd_mismatch;
                let target = target.clone();
                ui.post(move || {
                    if let Some(inner) = target.upgrade() {
                        inner.gsd_mismatch.set(range);
                    }
                });
            },
        )));

        let target = weak;
        let ui = inner.ui.clone();
        subscriptions.push(inner.settings.use_airspace_data_for_planning().add_listener(
            move |_| {
                let target: Weak<Inner> = target.clone();
                ui.run(move || {
                    if let Some(inner) = target.upgrade() {
                        inner.recalculate_if_automatic();
                    }
                });
            },
        ));

        *inner.subscriptions.lock() = subscriptions;
    }

    fn on_document_event(&self, event: DocumentEvent) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.update_properties();
        if event.is_structural() {
            self.rebuild_waypoints();
        }
    }

    fn update_properties(&self) {
        self.sync.refresh();

        if !self.loaded.swap(true, Ordering::SeqCst) {
            let mut areas = Vec::new();
            for statement in self.document.statements() {
                statement.walk(&mut |node| {
                    if let StatementKind::AreaOfInterest(area) = &node.kind {
                        areas.push(AreaOfInterest {
                            node: node.id,
                            name: area.name.clone(),
                            corners: area.corners.clone(),
                            min_corners: area.min_corners,
                        });
                    }
                });
            }
            self.areas_of_interest.extend(areas);
        }

        self.update_saveable();
    }

    fn on_areas_changed(&self, change: &ListChange<AreaOfInterest>) {
        if let ListChange::Removed(removed) = change {
            for area in removed {
                self.document.remove_statement(area.node);
            }
        }
        let valid = self
            .areas_of_interest
            .get()
            .iter()
            .all(AreaOfInterest::has_enough_corners);
        self.all_aois_valid.set(valid);
        self.update_saveable();
    }

    fn update_saveable(&self) {
        let saveable = self.all_aois_valid.get()
            && (self.is_template || !self.areas_of_interest.is_empty());
        self.saveable.set(saveable);
    }

    fn rebuild_waypoints(&self) {
        let mut waypoints = Vec::new();
        for statement in self.document.statements() {
            statement.walk(&mut |node| {
                if let StatementKind::Waypoint(source) = &node.kind {
                    let index = waypoints.len() + 1;
                    waypoints.push(WayPoint::new(node.id, source, index));
                }
            });
        }

        if !self.is_template {
            if let Some(result) = self.document.simulation().latest() {
                self.evaluate(&waypoints, &result);
            }
        }

        self.waypoints.replace_all(waypoints);
    }

    fn on_simulation_result(&self, result: &SimulationResult) {
        if self.is_template || self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let waypoints = self.waypoints.get();
        for waypoint in &waypoints {
            waypoint.clear_warnings();
        }
        self.evaluate(&waypoints, result);
    }

    fn evaluate(&self, waypoints: &[WayPoint], result: &SimulationResult) -> EvaluationOutcome {
        let keys: Vec<NodeId> = waypoints.iter().map(WayPoint::node).collect();
        let mut state = vec![WaypointWarnings::default(); waypoints.len()];
        let outcome = self.evaluator().evaluate(result, &keys, &mut state);

        for (waypoint, warnings) in waypoints.iter().zip(&state) {
            waypoint.apply(warnings);
        }
        self.simulated_time_valid.set(result.simulated_time_valid);

        if let EvaluationOutcome::Desynchronized { sample_index } = outcome {
            debug!(
                sample_index,
                waypoints = waypoints.len(),
                "simulation result out of step with waypoint list"
            );
        }
        outcome
    }

    fn evaluator(&self) -> WaypointWarningEvaluator {
        WaypointWarningEvaluator::new(WarningParams {
            min_ground_distance_m: self.document.hardware().platform.min_ground_distance_m,
            use_airspace_data_for_planning: self.settings.use_airspace_data_for_planning().get(),
        })
    }

    fn recalculate_if_automatic(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.document.recalculate_on_every_change() {
            self.document.recalculate();
        }
    }
}

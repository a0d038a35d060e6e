//! Flight plan model integration tests.
//!
//! Drives an in-memory document and a manually drained UI loop, checking
//! what the model exposes after each step.

use mpc_core::{
    ui_context, CoverageResult, FlightPlanDocument, FlightPlanModel, GsdRange,
    HardwareConfiguration, InMemoryDocument, ListChange, NodeId, PlanningContext,
    PlanningSettings, PlatformDescription, Position, SimDistance, SimulationResult,
    StatementKind, UiLoop, WayPoint,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn setup() -> (PlanningContext, UiLoop) {
    let (ui, ui_loop) = ui_context();
    (PlanningContext::new(ui, PlanningSettings::default()), ui_loop)
}

fn pos(i: u32) -> Position {
    Position::new(47.0 + f64::from(i) * 0.001, 8.0, 60.0)
}

fn platform(min_ground_distance_m: f64) -> HardwareConfiguration {
    HardwareConfiguration {
        platform: PlatformDescription {
            min_ground_distance_m,
            ..PlatformDescription::default()
        },
        payload_mounts: Vec::new(),
    }
}

/// Waypoint ids in depth-first document order.
fn traversal(doc: &InMemoryDocument) -> Vec<NodeId> {
    let mut ids = Vec::new();
    for statement in doc.statements() {
        statement.walk(&mut |node| {
            if matches!(node.kind, StatementKind::Waypoint(_)) {
                ids.push(node.id);
            }
        });
    }
    ids
}

fn model_ids(plan: &FlightPlanModel) -> Vec<NodeId> {
    plan.waypoints().get().iter().map(WayPoint::node).collect()
}

fn square() -> Vec<Position> {
    vec![pos(0), pos(1), pos(2), pos(3)]
}

#[test]
fn test_waypoints_follow_every_structural_edit() {
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::new("survey"));
    let first = doc.add_waypoint(None, pos(0), 0.0);
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);
    assert_eq!(model_ids(&plan), vec![first]);

    let group = doc.add_container(None);
    let nested = doc.add_waypoint(Some(group), pos(1), 0.0);
    ui_loop.run_until_idle();
    assert_eq!(model_ids(&plan), traversal(&doc));

    let last = doc.add_waypoint(None, pos(2), 0.0);
    ui_loop.run_until_idle();
    assert_eq!(model_ids(&plan), vec![first, nested, last]);

    doc.remove_statement(first);
    ui_loop.run_until_idle();
    assert_eq!(model_ids(&plan), traversal(&doc));

    doc.reorder(&[last, group]);
    ui_loop.run_until_idle();
    assert_eq!(model_ids(&plan), vec![last, nested]);

    let indices: Vec<usize> = plan.waypoints().get().iter().map(WayPoint::index).collect();
    assert_eq!(indices, vec![1, 2]);
}

#[test]
fn test_rebuild_replaces_list_wholesale() {
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::new("survey"));
    doc.add_waypoint(None, pos(0), 0.0);
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);

    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    let _subscription = plan.waypoints().add_listener(move |change| {
        let summary = match change {
            ListChange::Removed(items) => ("removed", items.len()),
            ListChange::Added(items) => ("added", items.len()),
        };
        sink.lock().push(summary);
    });

    doc.add_waypoint(None, pos(1), 0.0);
    ui_loop.run_until_idle();

    assert_eq!(*changes.lock(), vec![("removed", 1), ("added", 2)]);
}

#[test]
fn test_value_edits_do_not_rebuild_waypoints() {
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::new("survey"));
    doc.add_waypoint(None, pos(0), 0.0);
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);

    let rebuilds = Arc::new(AtomicUsize::new(0));
    let counter = rebuilds.clone();
    let _subscription = plan.waypoints().add_listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    doc.set_notes("windy".to_string());
    ui_loop.run_until_idle();

    assert_eq!(plan.fields().notes.get(), "windy");
    assert_eq!(rebuilds.load(Ordering::SeqCst), 0);
}

#[test]
fn test_refresh_of_unchanged_document_is_silent() {
    let (ctx, _ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::new("survey"));
    let plan = FlightPlanModel::new(doc, false, &ctx);

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let _name = plan.fields().name.add_listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = hits.clone();
    let _dirty = plan.fields().has_unsaved_changes.add_listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    for _ in 0..5 {
        plan.refresh();
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_rename_pushes_to_document() {
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::new("survey"));
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);
    assert!(!plan.is_name_set().get());

    plan.rename("North field");
    ui_loop.run_until_idle();

    assert_eq!(doc.name(), "North field");
    assert!(plan.is_name_set().get());
    assert!(plan.has_unsaved_changes());
}

#[test]
fn test_simulation_result_sets_warnings_on_ui_loop() {
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::with_hardware("survey", platform(20.0)));
    let w1 = doc.add_waypoint(None, pos(0), 0.0);
    let w2 = doc.add_waypoint(None, pos(1), 0.0);
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);
    ui_loop.run_until_idle();

    doc.simulation_engine().publish(
        SimulationResult {
            samples: vec![
                SimDistance::new(w1, 50.0, 100.0),
                SimDistance::new(w2, 30.0, 100.0),
                SimDistance::new(w2, 12.0, -1.0),
            ],
            first_heading: Some(w1),
            simulated_time_valid: true,
        },
        false,
    );

    let waypoints = plan.waypoints().get();
    assert!(!waypoints[1].height_warning().get(), "applied before the UI loop ran");

    ui_loop.run_until_idle();

    assert!(!waypoints[0].height_warning().get());
    assert_eq!(waypoints[0].ground_distance_m().get(), Some(50.0));
    assert!(waypoints[1].height_warning().get());
    assert!(waypoints[1].airspace_warning().get());
    assert_eq!(waypoints[1].ground_distance_m().get(), Some(12.0));
    assert!(plan.simulated_time_valid().get());
}

#[test]
fn test_new_result_clears_previous_warnings() {
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::with_hardware("survey", platform(20.0)));
    let w1 = doc.add_waypoint(None, pos(0), 0.0);
    let w2 = doc.add_waypoint(None, pos(1), 0.0);
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);
    let engine = doc.simulation_engine();

    let low = SimulationResult {
        samples: vec![SimDistance::new(w1, 50.0, 100.0), SimDistance::new(w2, 5.0, 100.0)],
        first_heading: Some(w1),
        simulated_time_valid: true,
    };
    engine.publish(low, false);
    ui_loop.run_until_idle();
    assert!(plan.waypoints().get()[1].height_warning().get());

    // Only the first waypoint is covered; the second must come back clean.
    let partial = SimulationResult {
        samples: vec![SimDistance::new(w1, 50.0, 100.0)],
        first_heading: Some(w1),
        simulated_time_valid: false,
    };
    engine.publish(partial, false);
    ui_loop.run_until_idle();

    let waypoints = plan.waypoints().get();
    assert!(!waypoints[1].height_warning().get());
    assert_eq!(waypoints[1].ground_distance_m().get(), None);
    assert!(!plan.simulated_time_valid().get());
}

#[test]
fn test_superseded_result_is_skipped() {
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::with_hardware("survey", platform(20.0)));
    let w1 = doc.add_waypoint(None, pos(0), 0.0);
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);

    doc.simulation_engine().publish(
        SimulationResult {
            samples: vec![SimDistance::new(w1, 1.0, 100.0)],
            first_heading: Some(w1),
            simulated_time_valid: true,
        },
        true,
    );
    assert_eq!(ui_loop.run_until_idle(), 0);
    assert!(!plan.waypoints().get()[0].height_warning().get());
}

#[test]
fn test_desynchronized_result_is_tolerated() {
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::with_hardware("survey", platform(20.0)));
    let w1 = doc.add_waypoint(None, pos(0), 0.0);
    doc.add_waypoint(None, pos(1), 0.0);
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);

    doc.simulation_engine().publish(
        SimulationResult {
            samples: vec![
                SimDistance::new(w1, 50.0, 100.0),
                SimDistance::new(NodeId(404), 1.0, -10.0),
            ],
            first_heading: Some(w1),
            simulated_time_valid: true,
        },
        false,
    );
    ui_loop.run_until_idle();

    let waypoints = plan.waypoints().get();
    assert_eq!(waypoints[0].ground_distance_m().get(), Some(50.0));
    assert!(!waypoints[1].height_warning().get());
    assert!(!waypoints[1].airspace_warning().get());
}

#[test]
fn test_rebuild_reapplies_latest_result() {
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::with_hardware("survey", platform(20.0)));
    let w1 = doc.add_waypoint(None, pos(0), 0.0);
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);

    doc.simulation_engine().publish(
        SimulationResult {
            samples: vec![SimDistance::new(w1, 3.0, 100.0)],
            first_heading: Some(w1),
            simulated_time_valid: true,
        },
        false,
    );
    ui_loop.run_until_idle();

    doc.add_waypoint(None, pos(1), 0.0);
    ui_loop.run_until_idle();

    let waypoints = plan.waypoints().get();
    assert_eq!(waypoints.len(), 2);
    assert!(waypoints[0].height_warning().get());
    assert!(!waypoints[1].height_warning().get());
}

#[test]
fn test_template_ignores_simulation() {
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::with_hardware("template", platform(20.0)));
    let w1 = doc.add_waypoint(None, pos(0), 0.0);
    let plan = FlightPlanModel::new(doc.clone(), true, &ctx);

    let engine = doc.simulation_engine();
    assert_eq!(engine.listener_count(), 0);
    engine.publish(
        SimulationResult {
            samples: vec![SimDistance::new(w1, 1.0, -1.0)],
            first_heading: Some(w1),
            simulated_time_valid: true,
        },
        false,
    );
    doc.add_waypoint(None, pos(1), 0.0);
    ui_loop.run_until_idle();

    assert!(plan
        .waypoints()
        .get()
        .iter()
        .all(|w| !w.height_warning().get() && !w.airspace_warning().get()));
}

#[test]
fn test_coverage_updates_gsd_mismatch() {
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::new("survey"));
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);

    let range = GsdRange { min: 1.2, max: 1.8 };
    doc.coverage_engine()
        .publish(CoverageResult { gsd_mismatch: range }, false);
    ui_loop.run_until_idle();

    assert_eq!(plan.gsd_mismatch().get(), range);
}

#[test]
fn test_areas_imported_once_and_validated() {
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::new("survey"));
    doc.add_area("field", square(), 3);
    let strip = doc.add_area("strip", vec![pos(0), pos(1)], 3);
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);

    assert_eq!(plan.areas_of_interest().len(), 2);
    assert!(!plan.all_aois_valid().get());
    assert!(!plan.can_be_saved());

    assert!(plan.remove_area_of_interest(strip));
    ui_loop.run_until_idle();

    assert!(plan.all_aois_valid().get());
    assert!(plan.can_be_saved());
    assert!(doc.statements().iter().all(|s| s.id != strip));

    doc.add_area("later", square(), 3);
    ui_loop.run_until_idle();
    assert_eq!(plan.areas_of_interest().len(), 1);
}

#[test]
fn test_saveable_needs_an_area_unless_template() {
    let (ctx, _ui_loop) = setup();
    let plan = FlightPlanModel::new(Arc::new(InMemoryDocument::new("plan")), false, &ctx);
    let template = FlightPlanModel::new(Arc::new(InMemoryDocument::new("tpl")), true, &ctx);

    assert!(!plan.can_be_saved());
    assert!(template.can_be_saved());
}

#[test]
fn test_airspace_setting_triggers_recalculation() {
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::new("survey"));
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);

    ctx.settings.use_airspace_data_for_planning().set(false);
    ui_loop.run_until_idle();
    assert_eq!(doc.recalculation_count(), 1);

    plan.fields().recalculate_on_every_change.set(false);
    ctx.settings.use_airspace_data_for_planning().set(true);
    ui_loop.run_until_idle();
    assert_eq!(doc.recalculation_count(), 1);
}

#[test]
fn test_save_writes_file_and_clears_dirty_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("survey.fml");
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::new("survey"));
    doc.add_area("field", square(), 3);
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);

    plan.set_file_location(path.clone());
    assert_eq!(doc.file(), Some(path.clone()));

    plan.save().unwrap();
    ui_loop.run_until_idle();

    assert!(path.exists());
    assert!(!plan.has_unsaved_changes());
}

#[test]
fn test_save_copy_leaves_plan_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let own = dir.path().join("survey.fml");
    let copy = dir.path().join("copy").join("survey.fml");
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::new("survey"));
    doc.add_area("field", square(), 3);
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);
    plan.set_file_location(own.clone());
    plan.fields().notes.set("draft".to_string());
    ui_loop.run_until_idle();

    plan.save_copy(&copy).unwrap();
    ui_loop.run_until_idle();

    assert_eq!(InMemoryDocument::open(&copy).unwrap().notes(), "draft");
    assert!(!own.exists());
    assert_eq!(plan.file(), Some(own));
    assert!(plan.has_unsaved_changes());
}

#[test]
fn test_edits_reach_document_while_refreshed_elsewhere() {
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::new("survey"));
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let plan = plan.clone();
            scope.spawn(move || {
                for _ in 0..1000 {
                    plan.refresh();
                }
            });
        }
        for i in 0..100 {
            let notes = format!("note {i}");
            plan.fields().notes.set(notes.clone());
            assert_eq!(doc.notes(), notes);
        }
    });
    ui_loop.run_until_idle();

    assert_eq!(plan.fields().notes.get(), "note 99");
    assert!(plan.has_unsaved_changes());
}

#[test]
fn test_dispose_detaches_model() {
    let (ctx, mut ui_loop) = setup();
    let doc = Arc::new(InMemoryDocument::new("survey"));
    doc.add_waypoint(None, pos(0), 0.0);
    let plan = FlightPlanModel::new(doc.clone(), false, &ctx);

    plan.dispose();
    doc.add_waypoint(None, pos(1), 0.0);
    ui_loop.run_until_idle();

    assert_eq!(plan.waypoints().len(), 1);
    assert_eq!(doc.simulation_engine().listener_count(), 0);
    assert_eq!(ctx.settings.use_airspace_data_for_planning().listener_count(), 0);
}

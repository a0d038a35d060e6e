//! Mission session integration tests.
//!
//! Every test runs against a throw-away project folder with the UI loop
//! driven in the background and dialogs answered from a script.

use futures::future::BoxFuture;
use futures::FutureExt;
use mpc_core::{
    ui_context, DocumentError, DocumentLoader, FlightPlanDocument, FlightPlanModel,
    InMemoryDocument, JsonDocumentLoader, PlanningContext, PlanningSettings, Position,
};
use mpc_session::{
    layout, mission_info, DialogService, Mission, MissionInfo, MissionSession, Notifier,
    RenameRequest, SaveChangesKind, SaveChangesRequest, SaveChangesResponse, Services,
    SessionConfig, SessionError, SessionState, Toast, ToastKind,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy)]
enum Answer {
    Cancel,
    Save,
    Discard,
}

#[derive(Default)]
struct ScriptedDialogs {
    answers: Mutex<VecDeque<Answer>>,
    names: Mutex<VecDeque<Option<String>>>,
    kinds: Mutex<Vec<SaveChangesKind>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl DialogService for ScriptedDialogs {
    fn request_save_changes(&self, request: SaveChangesRequest) -> BoxFuture<'static, SaveChangesResponse> {
        self.kinds.lock().push(request.kind);
        let answer = self.answers.lock().pop_front().unwrap_or(Answer::Cancel);
        let gate = self.gate.lock().take();
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            match answer {
                Answer::Cancel => SaveChangesResponse::cancel(&request),
                Answer::Save => SaveChangesResponse::proceed(&request, true),
                Answer::Discard => SaveChangesResponse::proceed(&request, false),
            }
        }
        .boxed()
    }

    fn request_mission_name(&self, request: RenameRequest) -> BoxFuture<'static, Option<String>> {
        let answer = self.names.lock().pop_front().flatten();
        let accepted = answer.filter(|name| (request.validator)(name));
        futures::future::ready(accepted).boxed()
    }
}

#[derive(Default)]
struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, toast: Toast) {
        self.toasts.lock().push(toast);
    }
}

struct Harness {
    session: MissionSession,
    dialogs: Arc<ScriptedDialogs>,
    notifier: Arc<RecordingNotifier>,
    projects: PathBuf,
    _dir: TempDir,
}

/// Opens plans from disk, but blocks the settings file of every clone it
/// loads a plan for, so writing the clone's settings fails.
struct SettingsBlockingLoader;

impl DocumentLoader for SettingsBlockingLoader {
    fn open(&self, path: &Path) -> Result<Arc<dyn FlightPlanDocument>, DocumentError> {
        if path.to_string_lossy().contains("Clone of") {
            if let Some(mission) = path.parent().and_then(Path::parent) {
                fs::create_dir_all(layout::settings_temp_file(mission)).unwrap();
            }
        }
        JsonDocumentLoader.open(path)
    }
}

fn harness() -> Harness {
    harness_with(|services| services)
}

fn harness_with(configure: impl FnOnce(Services) -> Services) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let projects = dir.path().join("projects");
    fs::create_dir_all(&projects).unwrap();

    let (ui, ui_loop) = ui_context();
    tokio::spawn(ui_loop.run());

    let dialogs = Arc::new(ScriptedDialogs::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let session = MissionSession::new(
        &SessionConfig::with_project_folder(&projects),
        PlanningContext::new(ui, PlanningSettings::default()),
        configure(Services::new(dialogs.clone()).with_notifier(notifier.clone())),
    );

    Harness {
        session,
        dialogs,
        notifier,
        projects,
        _dir: dir,
    }
}

/// Write a saveable flight plan document to `file`.
fn write_plan(file: &Path, name: &str) {
    let document = InMemoryDocument::new(name);
    document.add_area("Field", vec![Position::new(47.0, 8.0, 0.0); 3], 3);
    document.set_file(Some(file.to_path_buf()));
    document.save().unwrap();
}

/// A mission folder with settings and, optionally, one saved flight plan.
fn seed_mission(projects: &Path, name: &str, plan: Option<&str>) -> PathBuf {
    let folder = projects.join(name);
    layout::create_mission_folders(&folder).unwrap();
    let mut info = MissionInfo::new(&folder);
    if let Some(plan) = plan {
        let file = layout::flight_plan_folder(&folder).join(format!("{plan}.fml"));
        write_plan(&file, plan);
        info.loaded_flight_plans.push(format!("{plan}.fml"));
    }
    mission_info::save_to_file(&info).unwrap();
    folder
}

fn edit_first_plan(mission: &Mission) -> FlightPlanModel {
    let plan = mission.flight_plans().get()[0].clone();
    plan.fields().notes.set("edited".to_string());
    plan.refresh();
    assert!(plan.has_unsaved_changes());
    plan
}

fn stored_notes(file: &Path) -> String {
    InMemoryDocument::open(file).unwrap().notes()
}

#[tokio::test]
async fn test_clone_names_never_collide() {
    let h = harness();
    let survey = seed_mission(&h.projects, "Survey", Some("Plan"));
    seed_mission(&h.projects, "Clone of Survey", Some("Plan"));

    let source = h.session.load(survey.clone()).await.unwrap();
    let first = h.session.load_cloned(source).await.unwrap();
    assert_eq!(first.name(), "Clone of Survey (2)");
    assert_eq!(h.session.current_mission(), Some(first.clone()));
    assert!(layout::flight_plan_folder(&first.directory())
        .join("Plan.fml")
        .is_file());
    assert_eq!(first.flight_plans().len(), 1);
    assert_eq!(
        first.flight_plans().get()[0].file(),
        Some(layout::flight_plan_folder(&first.directory()).join("Plan.fml"))
    );

    let source = h.session.load(survey).await.unwrap();
    let second = h.session.load_cloned(source).await.unwrap();
    assert_eq!(second.name(), "Clone of Survey (3)");
}

#[tokio::test]
async fn test_unsaved_plan_is_written_into_clone() {
    let h = harness();
    let survey = seed_mission(&h.projects, "Survey", Some("Plan"));

    let source = h.session.load(survey.clone()).await.unwrap();
    let plan = edit_first_plan(&source);
    let clone = h.session.load_cloned(source).await.unwrap();

    let cloned_file = layout::flight_plan_folder(&clone.directory()).join("Plan.fml");
    assert_eq!(stored_notes(&cloned_file), "edited");
    // the source file keeps its saved state
    let source_file = layout::flight_plan_folder(&survey).join("Plan.fml");
    assert_eq!(stored_notes(&source_file), "");
    assert_eq!(plan.file(), Some(source_file));
    assert!(plan.has_unsaved_changes());
}

#[tokio::test]
async fn test_failed_clone_leaves_source_untouched() {
    let h = harness_with(|services| services.with_loader(Arc::new(SettingsBlockingLoader)));
    let survey = seed_mission(&h.projects, "Survey", Some("Plan"));

    let source = h.session.load(survey.clone()).await.unwrap();
    let plan = edit_first_plan(&source);
    let result = h.session.load_cloned(source.clone()).await;

    assert!(result.is_err());
    let source_file = layout::flight_plan_folder(&survey).join("Plan.fml");
    assert_eq!(plan.file(), Some(source_file.clone()));
    assert!(plan.has_unsaved_changes());
    assert_eq!(stored_notes(&source_file), "");
    assert!(!h.projects.join("Clone of Survey").exists());
    assert!(!h
        .session
        .catalogue()
        .missions()
        .iter()
        .any(|info| info.name == "Clone of Survey"));
    assert_eq!(h.session.current_mission(), Some(source));
    assert!(h
        .notifier
        .toasts
        .lock()
        .iter()
        .any(|toast| toast.kind == ToastKind::Alert));
}

#[tokio::test]
async fn test_clone_of_vanished_mission_fails() {
    let h = harness();
    let survey = seed_mission(&h.projects, "Survey", Some("Plan"));
    let source = h.session.load(survey.clone()).await.unwrap();

    fs::remove_dir_all(&survey).unwrap();
    let result = h.session.load_cloned(source.clone()).await;

    assert!(matches!(result, Err(SessionError::NotFound(_))));
    assert_eq!(h.session.current_mission(), Some(source));
    assert!(h
        .notifier
        .toasts
        .lock()
        .iter()
        .any(|toast| toast.kind == ToastKind::Alert));
}

#[tokio::test]
async fn test_refresh_prunes_empty_missions_except_current() {
    let h = harness();
    let empty = seed_mission(&h.projects, "Empty", None);
    fs::write(
        layout::screenshot_folder(&empty).join(layout::SCREENSHOT_FILENAME),
        b"jpg",
    )
    .unwrap();
    let current = seed_mission(&h.projects, "Current", None);
    let logged = seed_mission(&h.projects, "Logged", None);
    let mut info = mission_info::read_from_file(&logged).unwrap();
    info.flight_logs.push("flight-1.bbx".to_string());
    mission_info::save_to_file(&info).unwrap();

    h.session.load(current.clone()).await.unwrap();
    let missions = h.session.refresh_missions().await.unwrap();

    assert!(!empty.exists());
    assert!(current.is_dir());
    assert!(logged.is_dir());
    let mut names: Vec<_> = missions.iter().map(|info| info.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["Current", "Logged"]);
}

#[tokio::test]
async fn test_new_empty_mission_is_pruned_on_unload() {
    let h = harness();
    h.session.ensure_mission().await.unwrap();
    let mission = h.session.current_mission().unwrap();
    let folder = mission.directory();
    assert!(folder.is_dir());
    assert!(layout::settings_file(&folder).is_file());

    h.session.ensure_mission().await.unwrap();
    assert_eq!(h.session.current_mission(), Some(mission));

    assert!(h.session.unload().await.unwrap());
    assert_eq!(h.session.state(), SessionState::NoMission);
    assert!(!folder.exists());
}

#[tokio::test]
async fn test_queued_operation_waits_for_dialog() {
    let h = harness();
    let survey = seed_mission(&h.projects, "Survey", Some("Plan"));
    let mission = h.session.load(survey.clone()).await.unwrap();
    edit_first_plan(&mission);

    let (release, gate) = oneshot::channel();
    *h.dialogs.gate.lock() = Some(gate);
    h.dialogs.answers.lock().push_back(Answer::Cancel);

    let unload = h.session.unload();
    let rename = h.session.rename(mission.clone(), "Harbor".to_string());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.session.pending_tasks(), 2);
    assert!(survey.is_dir());
    assert!(!h.projects.join("Harbor").exists());

    release.send(()).unwrap();
    assert!(!unload.await.unwrap());
    rename.await.unwrap();

    assert!(h.projects.join("Harbor").is_dir());
    assert!(!survey.exists());
    assert_eq!(h.session.state(), SessionState::MissionLoaded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_clone_and_rename_run_one_after_another() {
    let h = harness();
    let survey = seed_mission(&h.projects, "Survey", Some("Plan"));
    let mission = h.session.load(survey.clone()).await.unwrap();

    let cloning = {
        let session = h.session.clone();
        let mission = mission.clone();
        tokio::spawn(async move { session.load_cloned(mission).await })
    };
    let renaming = {
        let session = h.session.clone();
        let mission = mission.clone();
        tokio::spawn(async move { session.rename(mission, "Harbor".to_string()).await })
    };

    let clone = cloning.await.unwrap().unwrap();
    renaming.await.unwrap().unwrap();

    let name = clone.name();
    assert!(
        name == "Clone of Survey" || name == "Clone of Harbor",
        "unexpected clone name {name}"
    );
    assert!(!survey.exists());
    assert!(h.projects.join("Harbor").is_dir());
    assert!(layout::flight_plan_folder(&clone.directory())
        .join("Plan.fml")
        .is_file());
}

#[tokio::test]
async fn test_rename_moves_folder_and_repoints_plans() {
    let h = harness();
    let survey = seed_mission(&h.projects, "Survey", Some("Plan"));
    let mission = h.session.load(survey.clone()).await.unwrap();
    let plan = mission.flight_plans().get()[0].clone();

    h.session
        .rename(mission.clone(), "Harbor".to_string())
        .await
        .unwrap();

    let harbor = h.projects.join("Harbor");
    assert!(!survey.exists());
    assert_eq!(mission.name(), "Harbor");
    assert_eq!(
        plan.file(),
        Some(layout::flight_plan_folder(&harbor).join("Plan.fml"))
    );
    let info = mission_info::read_from_file(&harbor).unwrap();
    assert_eq!(info.loaded_flight_plans, vec!["Plan.fml"]);
}

#[tokio::test]
async fn test_rename_rejects_invalid_names() {
    let h = harness();
    let survey = seed_mission(&h.projects, "Survey", Some("Plan"));
    seed_mission(&h.projects, "Harbor", Some("Plan"));
    let mission = h.session.load(survey.clone()).await.unwrap();
    h.session.refresh_missions().await.unwrap();

    let catalogue = h.session.catalogue();
    assert!(!catalogue.is_valid_mission_name(""));
    assert!(!catalogue.is_valid_mission_name("harbor"));
    assert!(!catalogue.is_valid_mission_name("a/b"));
    assert!(!catalogue.is_valid_mission_name("up..there"));
    assert!(!catalogue.is_valid_mission_name("Demo"));
    assert!(!catalogue.is_valid_mission_name("Survey."));
    assert!(!catalogue.is_valid_mission_name(" Survey 2"));
    assert!(catalogue.is_valid_mission_name("Survey 2"));
    assert!(!h.projects.join("Survey 2").exists());

    let result = h.session.rename(mission, "harbor".to_string()).await;
    assert!(matches!(result, Err(SessionError::InvalidName(_))));
    assert!(survey.is_dir());
}

#[tokio::test]
async fn test_declined_dialog_keeps_mission_loaded() {
    let h = harness();
    let survey = seed_mission(&h.projects, "Survey", Some("Plan"));
    let mission = h.session.load(survey.clone()).await.unwrap();
    edit_first_plan(&mission);

    h.dialogs.answers.lock().push_back(Answer::Cancel);
    assert!(!h.session.unload().await.unwrap());
    assert_eq!(h.session.current_mission(), Some(mission));
    assert_eq!(*h.dialogs.kinds.lock(), vec![SaveChangesKind::Close]);
}

#[tokio::test]
async fn test_discarded_changes_are_not_written() {
    let h = harness();
    let survey = seed_mission(&h.projects, "Survey", Some("Plan"));
    let mission = h.session.load(survey.clone()).await.unwrap();
    edit_first_plan(&mission);

    h.dialogs.answers.lock().push_back(Answer::Discard);
    assert!(h.session.unload().await.unwrap());

    assert_eq!(h.session.state(), SessionState::NoMission);
    assert_eq!(
        stored_notes(&layout::flight_plan_folder(&survey).join("Plan.fml")),
        ""
    );
}

#[tokio::test]
async fn test_saved_changes_are_written() {
    let h = harness();
    let survey = seed_mission(&h.projects, "Survey", Some("Plan"));
    let mission = h.session.load(survey.clone()).await.unwrap();
    edit_first_plan(&mission);

    h.dialogs.answers.lock().push_back(Answer::Save);
    assert!(h.session.close_on_exit().await.unwrap());

    assert_eq!(
        stored_notes(&layout::flight_plan_folder(&survey).join("Plan.fml")),
        "edited"
    );
    assert!(survey.is_dir());
}

#[tokio::test]
async fn test_demo_mission_must_be_renamed() {
    let h = harness();
    let demo = seed_mission(&h.projects, "DEMO", Some("Plan"));
    let mission = h.session.load(demo.clone()).await.unwrap();
    edit_first_plan(&mission);

    h.dialogs.answers.lock().push_back(Answer::Cancel);
    assert!(!h.session.unload().await.unwrap());
    assert_eq!(*h.dialogs.kinds.lock(), vec![SaveChangesKind::Demo]);

    h.dialogs.names.lock().push_back(None);
    assert!(!h.session.rename_current().await.unwrap());
    assert!(demo.is_dir());

    h.dialogs.names.lock().push_back(Some("Harbor".to_string()));
    assert!(h.session.rename_current().await.unwrap());
    assert_eq!(mission.name(), "Harbor");
    assert!(h.projects.join("Harbor").is_dir());
}

#[tokio::test]
async fn test_legacy_mission_is_migrated_on_load() {
    let h = harness();
    let folder = h.projects.join("Legacy");
    fs::create_dir_all(folder.join("flightplans")).unwrap();
    write_plan(&folder.join("flightplans").join("Plan.fml"), "Plan");
    fs::write(
        layout::legacy_settings_file(&folder),
        r#"<properties>
<entry key="srsId">EPSG:4326</entry>
<entry key="loadedFlightplan.0">Plan.fml</entry>
</properties>"#,
    )
    .unwrap();

    let mission = h.session.load(folder.clone()).await.unwrap();

    assert!(!folder.join("flightplans").exists());
    assert_eq!(mission.flight_plans().len(), 1);
    assert_eq!(
        mission.flight_plans().get()[0].file(),
        Some(layout::flight_plan_folder(&folder).join("Plan.fml"))
    );
    let info = mission_info::read_from_file(&folder).unwrap();
    assert_eq!(info.srs_id, "EPSG:4326");
    assert!(layout::settings_file(&folder).is_file());
}

#[tokio::test]
async fn test_missions_outside_project_folder_are_referenced() {
    let h = harness();
    let elsewhere = h._dir.path().join("elsewhere");
    let outside = seed_mission(&elsewhere, "Outside", Some("Plan"));

    h.session.load(outside.clone()).await.unwrap();
    assert_eq!(h.session.catalogue().referenced_projects(), vec![outside.clone()]);

    let names: Vec<_> = h
        .session
        .refresh_missions()
        .await
        .unwrap()
        .into_iter()
        .map(|info| info.name)
        .collect();
    assert_eq!(names, vec!["Outside"]);

    h.session.unload().await.unwrap();
    fs::remove_dir_all(&outside).unwrap();
    h.session.refresh_missions().await.unwrap();
    assert!(h.session.catalogue().referenced_projects().is_empty());
}

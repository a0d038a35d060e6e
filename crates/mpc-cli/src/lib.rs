//! MPC CLI - command line front end for mission sessions.
//!
//! The `mpc` binary drives a [`MissionSession`] without a UI toolkit:
//! dialogs are answered from command line flags and toasts go to the log.

pub mod console;
pub mod report;

pub use console::{ChangesPolicy, ConsoleDialogs};

use mpc_core::{ui_context, PlanningContext, PlanningSettings};
use mpc_session::{DialogService, MissionSession, Services, SessionConfig};
use std::path::PathBuf;
use std::sync::Arc;

/// Start a session on `config` with its UI loop running on the current
/// runtime.
pub fn start_session(config: &SessionConfig, dialogs: Arc<dyn DialogService>) -> MissionSession {
    let (ui, ui_loop) = ui_context();
    tokio::spawn(ui_loop.run());

    let context = PlanningContext::new(
        ui,
        PlanningSettings::new(config.use_airspace_data_for_planning),
    );
    MissionSession::new(config, context, Services::new(dialogs))
}

/// Folder of the mission called `name`, looked up among known missions
/// first and then directly below the project folder.
pub fn find_mission(session: &MissionSession, name: &str) -> Option<PathBuf> {
    let catalogue = session.catalogue();
    catalogue
        .missions()
        .into_iter()
        .find(|info| info.name == name)
        .map(|info| info.folder().to_path_buf())
        .or_else(|| {
            let folder = catalogue.project_folder().join(name);
            folder.is_dir().then_some(folder)
        })
}

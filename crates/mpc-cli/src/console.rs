//! Dialog answers taken from the command line.

use futures::future::BoxFuture;
use futures::FutureExt;
use mpc_session::{
    DialogService, RenameRequest, SaveChangesKind, SaveChangesRequest, SaveChangesResponse,
};
use tracing::warn;

/// What to do with unsaved changes when a command closes a mission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ChangesPolicy {
    /// Abort the command and keep the mission as it is
    #[default]
    Keep,
    Save,
    Discard,
}

#[derive(Debug, Clone, Default)]
pub struct ConsoleDialogs {
    pub policy: ChangesPolicy,
    /// Answer for the mission name prompt
    pub new_name: Option<String>,
}

impl ConsoleDialogs {
    pub fn new(policy: ChangesPolicy, new_name: Option<String>) -> Self {
        Self { policy, new_name }
    }
}

impl DialogService for ConsoleDialogs {
    fn request_save_changes(&self, request: SaveChangesRequest) -> BoxFuture<'static, SaveChangesResponse> {
        if request.kind == SaveChangesKind::Demo {
            println!("The demo mission has unsaved changes.");
        } else {
            println!("Mission '{}' has unsaved changes:", request.mission.name());
        }
        for changed in &request.changed_items {
            println!("  - {}", changed.item.name());
        }

        let response = match self.policy {
            ChangesPolicy::Keep => {
                println!("Keeping changes; pass --changes save or --changes discard to go on.");
                SaveChangesResponse::cancel(&request)
            }
            ChangesPolicy::Save => SaveChangesResponse::proceed(&request, true),
            ChangesPolicy::Discard => SaveChangesResponse::proceed(&request, false),
        };
        futures::future::ready(response).boxed()
    }

    fn request_mission_name(&self, request: RenameRequest) -> BoxFuture<'static, Option<String>> {
        let answer = match &self.new_name {
            Some(name) if (request.validator)(name) => Some(name.clone()),
            Some(name) => {
                warn!(name = %name, "Rejected mission name");
                println!("'{name}' is not a valid mission name.");
                None
            }
            None => {
                println!("{}: pass --name to rename '{}'.", request.title, request.old_name);
                None
            }
        };
        futures::future::ready(answer).boxed()
    }
}

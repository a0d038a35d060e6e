//! Collaborators the session talks to instead of a UI toolkit.
//!
//! Every dialog is an asynchronous request: the strand task that asks
//! suspends on the returned future until the user answers.

use crate::mission::{Mission, UnsavedItem};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{info, warn};

/// Which save-changes dialog to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveChangesKind {
    /// Closing or switching missions
    Close,
    /// The current mission still carries the reserved demo name
    Demo,
}

/// One changed item shown in the save-changes dialog.
#[derive(Debug, Clone)]
pub struct ChangedItem {
    pub item: UnsavedItem,
    /// Ticked by default; unticked items are discarded
    pub needs_save: bool,
}

#[derive(Debug, Clone)]
pub struct SaveChangesRequest {
    pub kind: SaveChangesKind,
    pub mission: Mission,
    pub changed_items: Vec<ChangedItem>,
}

#[derive(Debug, Clone)]
pub struct SaveChangesResponse {
    /// False when the dialog was dismissed; the operation is abandoned
    pub should_proceed: bool,
    pub should_save_changes: bool,
    /// Mission name as edited in the dialog
    pub name: String,
    pub changed_items: Vec<ChangedItem>,
}

impl SaveChangesResponse {
    /// Answer that dismisses the dialog.
    pub fn cancel(request: &SaveChangesRequest) -> Self {
        Self {
            should_proceed: false,
            should_save_changes: false,
            name: request.mission.name(),
            changed_items: request.changed_items.clone(),
        }
    }

    /// Answer that keeps the name and saves or discards everything.
    pub fn proceed(request: &SaveChangesRequest, save: bool) -> Self {
        Self {
            should_proceed: true,
            should_save_changes: save,
            name: request.mission.name(),
            changed_items: request.changed_items.clone(),
        }
    }
}

pub type NameValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Request for a new mission name.
#[derive(Clone)]
pub struct RenameRequest {
    pub title: String,
    pub label: String,
    pub old_name: String,
    pub validator: NameValidator,
}

impl std::fmt::Debug for RenameRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenameRequest")
            .field("title", &self.title)
            .field("old_name", &self.old_name)
            .finish_non_exhaustive()
    }
}

pub trait DialogService: Send + Sync {
    fn request_save_changes(&self, request: SaveChangesRequest) -> BoxFuture<'static, SaveChangesResponse>;

    /// `None` when the user cancels.
    fn request_mission_name(&self, request: RenameRequest) -> BoxFuture<'static, Option<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Alert,
}

/// Short non-blocking notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub text: String,
}

impl Toast {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Info,
            text: text.into(),
        }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Alert,
            text: text.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Writes toasts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, toast: Toast) {
        match toast.kind {
            ToastKind::Info => info!(text = %toast.text, "toast"),
            ToastKind::Alert => warn!(text = %toast.text, "toast"),
        }
    }
}

/// Encoded JPEG images of the main view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub full: Vec<u8>,
    pub low_res: Vec<u8>,
}

pub trait ScreenshotProvider: Send + Sync {
    /// `None` when nothing can be rendered.
    fn capture(&self) -> Option<Screenshot>;
}

/// For headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScreenshots;

impl ScreenshotProvider for NoScreenshots {
    fn capture(&self) -> Option<Screenshot> {
        None
    }
}

/// Message catalogue. `{0}`, `{1}`, ... are replaced by `args`.
pub trait Localizer: Send + Sync {
    fn get(&self, key: &str, args: &[&str]) -> String;
}

pub mod keys {
    pub const FOLDER_EXISTS: &str = "mission.create.folderExists";
    pub const FOLDER_NOT_FOUND: &str = "mission.create.notFound";
    pub const FOLDER_DENIED: &str = "mission.create.denied";
    pub const IO_ERROR: &str = "mission.ioError";
    pub const CANNOT_RENAME: &str = "mission.rename.failed";
    pub const CANNOT_DELETE_EMPTY: &str = "mission.prune.failed";
    pub const RENAME_TITLE: &str = "renameDialog.title";
    pub const RENAME_LABEL: &str = "renameDialog.name";
    pub const RENAME_DEMO_TITLE: &str = "renameDialog.demo.title";
    pub const RENAME_DEMO_LABEL: &str = "renameDialog.demo.name";
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EnglishLocalizer;

impl Localizer for EnglishLocalizer {
    fn get(&self, key: &str, args: &[&str]) -> String {
        let template = match key {
            keys::FOLDER_EXISTS => "A mission folder named {0} already exists.",
            keys::FOLDER_NOT_FOUND => "The project folder {0} cannot be found.",
            keys::FOLDER_DENIED => "Access to {0} was denied.",
            keys::IO_ERROR => "The mission could not be opened. {0}",
            keys::CANNOT_RENAME => "The mission could not be renamed. {0}",
            keys::CANNOT_DELETE_EMPTY => "The empty mission {0} could not be deleted.",
            keys::RENAME_TITLE => "Rename mission",
            keys::RENAME_LABEL => "Mission name",
            keys::RENAME_DEMO_TITLE => "Save demo mission",
            keys::RENAME_DEMO_LABEL => "The demo mission needs a new name before it can be saved",
            other => other,
        };

        args.iter()
            .enumerate()
            .fold(template.to_string(), |text, (i, arg)| {
                text.replace(&format!("{{{i}}}"), arg)
            })
    }
}

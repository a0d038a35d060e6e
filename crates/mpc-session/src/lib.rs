pub mod catalogue;
pub mod config;
pub mod dialog;
pub mod error;
pub mod layout;
pub mod legacy;
pub mod mission;
pub mod mission_info;
pub mod session;
pub mod strand;

pub use catalogue::MissionCatalogue;
pub use config::SessionConfig;
pub use dialog::{
    ChangedItem, DialogService, EnglishLocalizer, Localizer, LogNotifier, NameValidator,
    NoScreenshots, Notifier, RenameRequest, SaveChangesKind, SaveChangesRequest,
    SaveChangesResponse, Screenshot, ScreenshotProvider, Toast, ToastKind,
};
pub use error::SessionError;
pub use mission::{Matching, MatchingStatus, Mission, UnsavedItem, DEMO_MISSION_NAME};
pub use mission_info::MissionInfo;
pub use session::{MissionSession, Services, SessionState};
pub use strand::{Strand, TaskHandle};

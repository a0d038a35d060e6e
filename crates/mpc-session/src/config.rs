//! Session configuration from environment.

use std::env;
use std::path::PathBuf;

/// Name of the project folder below the user's home directory.
pub const DEFAULT_PROJECT_FOLDER_NAME: &str = "MissionControl Projects";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Folder new missions are created in
    pub project_folder: PathBuf,
    /// Missions living outside the project folder
    pub referenced_projects: Vec<PathBuf>,
    pub use_airspace_data_for_planning: bool,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self {
            project_folder: env::var_os("MPC_PROJECT_FOLDER")
                .map(PathBuf::from)
                .unwrap_or_else(|| home_dir().join(DEFAULT_PROJECT_FOLDER_NAME)),
            referenced_projects: env::var_os("MPC_REFERENCED_PROJECTS")
                .map(|paths| env::split_paths(&paths).collect())
                .unwrap_or_default(),
            use_airspace_data_for_planning: env::var("MPC_USE_AIRSPACE_DATA")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
        }
    }

    /// Configuration rooted at `folder`, without referenced projects.
    pub fn with_project_folder(folder: impl Into<PathBuf>) -> Self {
        Self {
            project_folder: folder.into(),
            referenced_projects: Vec::new(),
            use_airspace_data_for_planning: true,
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

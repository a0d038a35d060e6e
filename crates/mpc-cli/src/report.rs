//! Plain text rendering of catalogue entries.

use mpc_session::MissionInfo;

pub fn mission_line(info: &MissionInfo) -> String {
    format!(
        "{:<32} {}  {:>3} plan(s)  {}",
        info.name,
        info.last_modified.format("%Y-%m-%d %H:%M"),
        info.loaded_flight_plans.len(),
        info.folder().display()
    )
}

/// One line per mission, newest first as the catalogue keeps them.
pub fn mission_table(infos: &[MissionInfo]) -> String {
    if infos.is_empty() {
        return "No missions.".to_string();
    }
    infos
        .iter()
        .map(mission_line)
        .collect::<Vec<_>>()
        .join("\n")
}

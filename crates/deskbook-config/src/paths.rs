use std::path::PathBuf;

/// XDG application name used for config, state, and log directories.
pub const APP_NAME: &str = "deskbook";

const STATE_FILE_NAME: &str = "state.json";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// `~/.config/deskbook`
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// `~/.local/state/deskbook`, falling back to the local data dir on
/// platforms without an XDG state dir (macOS).
pub fn state_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| {
        dirs.state_dir()
            .unwrap_or_else(|| dirs.data_local_dir())
            .to_path_buf()
    })
}

/// Used when no home directory can be determined (e.g. bare containers).
pub fn state_dir_fallback() -> PathBuf {
    std::env::temp_dir().join(format!("{APP_NAME}-state"))
}

pub fn default_state_file() -> PathBuf {
    state_dir()
        .unwrap_or_else(state_dir_fallback)
        .join(STATE_FILE_NAME)
}

pub fn log_dir() -> PathBuf {
    state_dir().unwrap_or_else(state_dir_fallback).join("logs")
}

//! Environment constants and path utilities.
//!
//! Every file name and directory name taskwave looks for lives here.

use std::path::{Path, PathBuf};

/// Application directory name (hidden, like .git)
pub const TASKWAVE_DIR_NAME: &str = ".taskwave";

/// Configuration file name inside [`TASKWAVE_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name at a project root
pub const PROJECT_CONFIG_FILE_NAME: &str = "taskwave.toml";

/// System-wide configuration file (Unix-like systems)
pub const SYSTEM_CONFIG_FILE: &str = "/etc/taskwave/config.toml";

/// Environment variable overriding the tracing filter
pub const LOG_ENV_VAR: &str = "RUST_LOG";

/// Build the .taskwave directory path from a root
pub fn taskwave_dir_path(root: &Path) -> PathBuf {
    root.join(TASKWAVE_DIR_NAME)
}

/// Build ./taskwave.toml
pub fn project_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(PROJECT_CONFIG_FILE_NAME)
}

/// Build ./.taskwave/config.toml
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    taskwave_dir_path(current_dir).join(CONFIG_FILE_NAME)
}

/// Build ~/.taskwave
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    taskwave_dir_path(home_dir)
}

/// Build ~/.taskwave/config.toml
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Home directory from `HOME` (or `USERPROFILE` on Windows)
pub fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok())
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

//! Task list file handling
//!
//! Task lists are UTF-8 JSON files:
//!
//! ```json
//! [
//!   {"id": "1", "description": "Collect the sources"},
//!   {"id": "2", "description": "Write the summary", "dependencies": ["1"], "max_retries": 5}
//! ]
//! ```

use crate::task::TaskList;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("File '{path}' is not UTF-8 encoded: {hint}")]
    NotUtf8 { path: PathBuf, hint: String },

    #[error("File '{path}' not found")]
    NotFound { path: PathBuf },

    #[error("IO error reading '{path}': {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Task parsing error in '{path}': {reason}")]
    ParseError { path: PathBuf, reason: String },
}

/// Loads task lists from disk
pub struct TaskLoader;

impl TaskLoader {
    fn load_utf8_file(path: &Path) -> Result<String, FileError> {
        debug!("Loading UTF-8 file: {:?}", path);

        fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FileError::NotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::InvalidData => FileError::NotUtf8 {
                path: path.to_path_buf(),
                hint: "Task lists must be UTF-8 JSON text".to_string(),
            },
            _ => FileError::IoError {
                path: path.to_path_buf(),
                source: e,
            },
        })
    }

    /// Load and validate a JSON task list
    pub fn load_task_list<P: AsRef<Path>>(path: P) -> Result<TaskList, FileError> {
        let path = path.as_ref();
        let content = Self::load_utf8_file(path)?;

        let list = TaskList::from_json(&content).map_err(|e| FileError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        debug!("Parsed {} tasks from {:?}", list.len(), path);
        Ok(list)
    }
}

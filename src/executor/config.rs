use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Program a [`CommandWorker`](super::CommandWorker) runs for each task.
///
/// ```toml
/// [worker]
/// program = "python3"
/// args = ["agents/worker.py"]
/// timeout_secs = 600
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandWorkerConfig {
    /// Program name or path
    pub program: String,

    /// Arguments passed before anything else
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory (inherits the current one when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Per-attempt timeout in seconds (None = no timeout)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Extra environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl CommandWorkerConfig {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
            timeout_secs: None,
            env: HashMap::new(),
        }
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Shell-quoted command line, for logs
    pub fn display_command(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| shell_escape::escape(part.as_str().into()).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

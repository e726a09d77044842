use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unique identifier for tasks within a registry
pub type TaskId = String;

/// Default number of attempts a task gets before it is terminally failed
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Core task structure with dependency and retry tracking
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub status: TaskStatus,
    pub dependencies: Vec<TaskId>,
    pub result: String,
    pub retry_count: u32,
    pub max_retries: u32,
    pub failure_history: Vec<String>,
}

/// Task status
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for dispatch (initial state, and the state a retried task returns to)
    Pending,
    /// Dispatched to a worker in the current wave
    Running,
    /// Finished successfully
    Completed,
    /// Exhausted its retries
    Failed,
}

/// What happened to a task after a failure was recorded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureDisposition {
    /// The task went back to `Pending` for another attempt
    Retrying { attempt: u32, remaining: u32 },
    /// The task reached its retry bound and is now `Failed`
    Exhausted { attempts: u32 },
}

/// Registry errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Task {0} does not exist")]
    TaskNotFound(TaskId),

    #[error("Task {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Invalid task list: {0}")]
    InvalidTaskList(String),
}

impl Task {
    /// Create a new pending task
    pub fn new(id: impl Into<TaskId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            result: String::new(),
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            failure_history: Vec::new(),
        }
    }

    /// Set the dependency list
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Set the retry bound
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Check if task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Check if task is waiting for dispatch
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// Check if another attempt is allowed
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Most recent failure reason, if any
    pub fn last_failure(&self) -> Option<&str> {
        self.failure_history.last().map(String::as_str)
    }

    /// Failure history formatted for a worker retrying this task.
    ///
    /// Returns `None` on the first attempt.
    pub fn retry_context(&self) -> Option<String> {
        if self.retry_count == 0 {
            return None;
        }

        let mut context = format!(
            "This is retry attempt {}. Previous failures:\n",
            self.retry_count
        );
        for (i, failure) in self.failure_history.iter().enumerate() {
            context.push_str(&format!("  Attempt {}: {}\n", i + 1, failure));
        }
        context.push_str("Please try an alternative approach.");
        Some(context)
    }
}

impl TaskStatus {
    /// Lowercase label used in logs and serialized output
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Icon used in the formatted task list
    pub fn icon(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "⬜",
            TaskStatus::Running => "🔄",
            TaskStatus::Completed => "✅",
            TaskStatus::Failed => "❌",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Task list input
// ============================================================================

/// Task identifier as it appears in input: planners emit both `"1"` and `1`
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawTaskId {
    Text(String),
    Number(u64),
}

impl RawTaskId {
    fn into_id(self) -> TaskId {
        match self {
            RawTaskId::Text(text) => text.trim().to_string(),
            RawTaskId::Number(n) => n.to_string(),
        }
    }
}

/// One record of a task list as supplied by the caller
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct TaskEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RawTaskId>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<RawTaskId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

/// Validated, immutable task specification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskSpec {
    pub id: TaskId,
    pub description: String,
    pub dependencies: Vec<TaskId>,
    pub max_retries: Option<u32>,
}

/// Validated task list, ready to be installed into a registry.
///
/// Construction is the only place input is checked; once built the list
/// cannot be modified, so `TaskRegistry::replace_all` never fails halfway.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskList {
    specs: Vec<TaskSpec>,
}

impl TaskList {
    /// Parse and validate a JSON task list:
    /// `[{"id": "1", "description": "...", "dependencies": ["..."]}]`
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| RegistryError::InvalidTaskList(format!("JSON parsing failed - {}", e)))?;

        if !value.is_array() {
            return Err(RegistryError::InvalidTaskList(
                "expected a JSON array of task objects".to_string(),
            ));
        }

        let entries: Vec<TaskEntry> = serde_json::from_value(value)
            .map_err(|e| RegistryError::InvalidTaskList(e.to_string()))?;

        Self::from_entries(entries)
    }

    /// Validate typed entries
    pub fn from_entries(entries: Vec<TaskEntry>) -> Result<Self, RegistryError> {
        let mut specs = Vec::with_capacity(entries.len());

        for (index, entry) in entries.into_iter().enumerate() {
            let position = index + 1;

            let id = match entry.id {
                Some(raw) => raw.into_id(),
                None => position.to_string(),
            };
            if id.is_empty() {
                return Err(RegistryError::InvalidTaskList(format!(
                    "entry {} has an empty id",
                    position
                )));
            }

            let description = entry.description;
            if description.trim().is_empty() {
                return Err(RegistryError::InvalidTaskList(format!(
                    "task {} has no description",
                    id
                )));
            }

            if entry.max_retries == Some(0) {
                return Err(RegistryError::InvalidTaskList(format!(
                    "task {} has max_retries = 0",
                    id
                )));
            }

            let dependencies = entry
                .dependencies
                .unwrap_or_default()
                .into_iter()
                .map(RawTaskId::into_id)
                .filter(|dep| !dep.is_empty())
                .collect();

            specs.push(TaskSpec {
                id,
                description,
                dependencies,
                max_retries: entry.max_retries,
            });
        }

        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[TaskSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl TaskSpec {
    /// Build a pending task, falling back to the run-wide retry bound
    pub fn to_task(&self, default_max_retries: u32) -> Task {
        Task::new(self.id.clone(), self.description.clone())
            .with_dependencies(self.dependencies.iter().cloned())
            .with_max_retries(self.max_retries.unwrap_or(default_max_retries))
    }
}

use crate::task::types::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Ordered store of tasks and their dependency edges.
///
/// The registry is plain data: it is owned by whoever drives a run and is
/// mutated only between waves, so it carries no locking of its own.
#[derive(Clone, Debug)]
pub struct TaskRegistry {
    tasks: HashMap<TaskId, Task>,
    /// Insertion order, used for reporting and ready-set precedence
    order: Vec<TaskId>,
    /// Tasks whose retry bound was set by the task list itself
    explicit_retries: HashSet<TaskId>,
    default_max_retries: u32,
}

/// Progress snapshot of a registry
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TaskProgress {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub completion_percentage: f64,
}

impl TaskRegistry {
    /// Create an empty registry using the default retry bound
    pub fn new() -> Self {
        Self::with_max_retries(DEFAULT_MAX_RETRIES)
    }

    /// Create an empty registry whose tasks default to `max_retries` attempts
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            tasks: HashMap::new(),
            order: Vec::new(),
            explicit_retries: HashSet::new(),
            default_max_retries: max_retries.max(1),
        }
    }

    pub fn default_max_retries(&self) -> u32 {
        self.default_max_retries
    }

    /// Change the retry bound of every task that has no bound of its own
    pub fn set_default_max_retries(&mut self, max_retries: u32) {
        let max_retries = max_retries.max(1);
        if max_retries == self.default_max_retries {
            return;
        }

        self.default_max_retries = max_retries;
        for (id, task) in self.tasks.iter_mut() {
            if !self.explicit_retries.contains(id) {
                task.max_retries = max_retries;
            }
        }
        debug!("Default retry bound set to {}", max_retries);
    }

    /// Discard every task and install `list` in its place.
    ///
    /// A duplicated id overwrites the earlier entry but keeps the earlier
    /// entry's position.
    pub fn replace_all(&mut self, list: &TaskList) {
        self.clear();

        for spec in list.specs() {
            let task = spec.to_task(self.default_max_retries);
            if spec.max_retries.is_some() {
                self.explicit_retries.insert(spec.id.clone());
            } else {
                self.explicit_retries.remove(&spec.id);
            }
            if self.tasks.insert(task.id.clone(), task).is_some() {
                debug!("Task {} redefined, keeping the last definition", spec.id);
            } else {
                self.order.push(spec.id.clone());
            }
        }

        for (task_id, dep_id) in self.unknown_dependencies() {
            warn!(
                "Dependency task '{}' of task '{}' does not exist, ignoring this dependency",
                dep_id, task_id
            );
        }

        debug!("Installed {} tasks", self.order.len());
    }

    /// Parse `json` and replace the registry contents; on error nothing changes
    pub fn replace_from_json(&mut self, json: &str) -> Result<usize, RegistryError> {
        let list = TaskList::from_json(json)?;
        self.replace_all(&list);
        Ok(self.len())
    }

    /// Remove all tasks
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.order.clear();
        self.explicit_retries.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    /// Get a task by ID
    pub fn get(&self, task_id: &str) -> Result<&Task, RegistryError> {
        self.tasks
            .get(task_id)
            .ok_or_else(|| RegistryError::TaskNotFound(task_id.to_string()))
    }

    fn get_mut(&mut self, task_id: &str) -> Result<&mut Task, RegistryError> {
        self.tasks
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::TaskNotFound(task_id.to_string()))
    }

    /// Tasks in insertion order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> + '_ {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    /// Whether every dependency of `task` is either completed or unknown
    fn dependencies_satisfied(&self, task: &Task) -> bool {
        task.dependencies.iter().all(|dep_id| {
            self.tasks
                .get(dep_id)
                .is_none_or(|dep| dep.status == TaskStatus::Completed)
        })
    }

    fn is_ready(&self, task: &Task) -> bool {
        task.is_pending() && self.dependencies_satisfied(task)
    }

    /// Pending tasks whose dependencies are all satisfied, in insertion order
    pub fn ready_set(&self) -> Vec<&Task> {
        self.tasks().filter(|task| self.is_ready(task)).collect()
    }

    /// First ready task, for callers that pull one task at a time
    pub fn next_ready(&self) -> Option<&Task> {
        self.tasks().find(|task| self.is_ready(task))
    }

    /// Pending tasks that are blocked on incomplete dependencies
    pub fn stalled_tasks(&self) -> Vec<&Task> {
        self.tasks()
            .filter(|task| task.is_pending() && !self.dependencies_satisfied(task))
            .collect()
    }

    /// Dependency ids that are not present in the registry, per task
    pub fn unknown_dependencies(&self) -> Vec<(TaskId, TaskId)> {
        self.tasks()
            .flat_map(|task| {
                task.dependencies
                    .iter()
                    .filter(|dep| !self.tasks.contains_key(*dep))
                    .map(|dep| (task.id.clone(), dep.clone()))
            })
            .collect()
    }

    /// Move a pending task to `Running`
    pub fn mark_running(&mut self, task_id: &str) -> Result<(), RegistryError> {
        let task = self.get_mut(task_id)?;
        if task.status != TaskStatus::Pending {
            return Err(RegistryError::InvalidTransition {
                id: task.id.clone(),
                from: task.status,
                to: TaskStatus::Running,
            });
        }

        task.status = TaskStatus::Running;
        debug!("Task {} has started execution", task_id);
        Ok(())
    }

    /// Record a successful attempt of a running task
    pub fn mark_completed(
        &mut self,
        task_id: &str,
        result: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let task = self.get_mut(task_id)?;
        if task.status != TaskStatus::Running {
            return Err(RegistryError::InvalidTransition {
                id: task.id.clone(),
                from: task.status,
                to: TaskStatus::Completed,
            });
        }

        task.status = TaskStatus::Completed;
        task.result = result.into();
        debug!("Task {} completed", task_id);
        Ok(())
    }

    /// Record a failed attempt of a running task.
    ///
    /// The task returns to `Pending` while attempts remain and becomes
    /// `Failed` once `retry_count` reaches `max_retries`.
    pub fn mark_failed(
        &mut self,
        task_id: &str,
        reason: impl Into<String>,
    ) -> Result<FailureDisposition, RegistryError> {
        let task = self.get_mut(task_id)?;
        if task.status != TaskStatus::Running {
            return Err(RegistryError::InvalidTransition {
                id: task.id.clone(),
                from: task.status,
                to: TaskStatus::Failed,
            });
        }

        task.failure_history.push(reason.into());
        task.retry_count += 1;

        if task.retry_count >= task.max_retries {
            task.status = TaskStatus::Failed;
            debug!(
                "Task {} has reached maximum retry attempts ({})",
                task_id, task.max_retries
            );
            Ok(FailureDisposition::Exhausted {
                attempts: task.retry_count,
            })
        } else {
            task.status = TaskStatus::Pending;
            debug!(
                "Task {} failed, preparing retry attempt {}",
                task_id,
                task.retry_count + 1
            );
            Ok(FailureDisposition::Retrying {
                attempt: task.retry_count + 1,
                remaining: task.max_retries - task.retry_count,
            })
        }
    }

    /// Whether the task may still be attempted
    pub fn can_retry(&self, task_id: &str) -> Result<bool, RegistryError> {
        Ok(self.get(task_id)?.can_retry())
    }

    /// True when every task is completed (vacuously true when empty)
    pub fn is_all_completed(&self) -> bool {
        self.tasks
            .values()
            .all(|task| task.status == TaskStatus::Completed)
    }

    /// True when at least one task is terminally failed
    pub fn has_any_failed(&self) -> bool {
        self.tasks
            .values()
            .any(|task| task.status == TaskStatus::Failed)
    }

    /// Count tasks by status
    pub fn progress(&self) -> TaskProgress {
        let mut progress = TaskProgress {
            total: self.len(),
            pending: 0,
            running: 0,
            completed: 0,
            failed: 0,
            completion_percentage: 0.0,
        };

        for task in self.tasks.values() {
            match task.status {
                TaskStatus::Pending => progress.pending += 1,
                TaskStatus::Running => progress.running += 1,
                TaskStatus::Completed => progress.completed += 1,
                TaskStatus::Failed => progress.failed += 1,
            }
        }

        if progress.total > 0 {
            progress.completion_percentage =
                progress.completed as f64 / progress.total as f64 * 100.0;
        }

        progress
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! # Wave Scheduler
//!
//! Drives a [`TaskRegistry`] to a terminal state in rounds ("waves").
//!
//! Each wave takes the current ready set, marks it running, dispatches every
//! ready task to its own tokio task bounded by a semaphore, waits for all of
//! them, and only then applies the results in insertion order. The loop ends
//! when nothing is ready or the wave cap is reached.
//!
//! Running a single task at a time is `max_concurrent = 1`; there is no
//! separate sequential mode.

use crate::board::{SharedMessageBoard, WorkerBoard, is_no_updates};
use crate::executor::{ExecutionOutcome, ExecutionRequest, ExecutorError, WorkerExecutor};
use crate::task::{FailureDisposition, TaskId, TaskProgress, TaskRegistry, build_summary};
use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub mod events;
pub mod plan;


pub use events::{LoggingEventHandler, SchedulerEvent, SchedulerEventHandler};
pub use plan::{WavePlan, plan_waves};

/// Default bound on concurrently running invocations
pub const DEFAULT_MAX_CONCURRENT: usize = 3;
/// Default bound on the number of waves per run
pub const DEFAULT_MAX_WAVES: u32 = 15;

/// Run configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Invocations allowed in flight at once
    pub max_concurrent: usize,
    /// Waves executed before the run gives up
    pub max_waves: u32,
    /// Attempts per task unless the task list says otherwise
    pub max_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_waves: DEFAULT_MAX_WAVES,
            max_retries: crate::task::DEFAULT_MAX_RETRIES,
        }
    }
}

impl SchedulerConfig {
    /// Empty registry whose tasks default to this config's retry bound
    pub fn new_registry(&self) -> TaskRegistry {
        TaskRegistry::with_max_retries(self.max_retries)
    }

    /// Check the bounds are usable
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be at least 1".to_string());
        }
        if self.max_waves == 0 {
            return Err("max_waves must be at least 1".to_string());
        }
        if self.max_retries == 0 {
            return Err("max_retries must be at least 1".to_string());
        }
        Ok(())
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every task completed
    Completed,
    /// At least one task exhausted its attempts
    SomeFailed,
    /// Pending tasks remain but none can become ready
    Deadlock { stalled: Vec<TaskId> },
    /// Tasks were still ready when the wave cap was reached
    WaveLimitExceeded,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }

    /// Process exit code used by the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::SomeFailed => 1,
            RunStatus::Deadlock { .. } => 2,
            RunStatus::WaveLimitExceeded => 3,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "all tasks completed"),
            RunStatus::SomeFailed => write!(f, "some tasks failed"),
            RunStatus::Deadlock { stalled } => {
                write!(f, "deadlock, stalled tasks: {}", stalled.join(", "))
            }
            RunStatus::WaveLimitExceeded => write!(f, "wave limit exceeded"),
        }
    }
}

/// Outcome of one call to [`WaveScheduler::run`]
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub waves_executed: u32,
    pub progress: TaskProgress,
    /// Rendered final summary, see [`build_summary`]
    pub summary: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Everything captured from the registry before a task is spawned
struct Dispatch {
    task_id: TaskId,
    board: WorkerBoard,
    handle: JoinHandle<Result<ExecutionOutcome, ExecutorError>>,
}

/// Wave-based scheduler over a shared [`WorkerExecutor`]
pub struct WaveScheduler {
    config: SchedulerConfig,
    executor: Arc<dyn WorkerExecutor>,
    event_handlers: Vec<Box<dyn SchedulerEventHandler + Send + Sync>>,
}

impl WaveScheduler {
    pub fn new(config: SchedulerConfig, executor: Arc<dyn WorkerExecutor>) -> Self {
        Self {
            config,
            executor,
            event_handlers: Vec::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Add event handler
    pub fn add_event_handler(&mut self, handler: Box<dyn SchedulerEventHandler + Send + Sync>) {
        self.event_handlers.push(handler);
    }

    /// Worker id used for a task's invocations and board messages
    pub fn worker_id(task_id: &str) -> String {
        format!("Worker-{}", task_id)
    }

    /// Execute waves until every task is terminal, progress stalls, or the
    /// wave cap is reached.
    ///
    /// Tasks without a retry bound of their own get `max_retries` from this
    /// scheduler's config. Task failures never make this return `Err`; errors
    /// here mean the registry was changed underneath the run.
    pub async fn run(&self, registry: &mut TaskRegistry, goal: &str) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        registry.set_default_max_retries(self.config.max_retries);
        let board = SharedMessageBoard::new();
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));

        self.emit_event(SchedulerEvent::RunStarted {
            run_id,
            task_count: registry.len(),
        });

        let mut waves_executed = 0;
        let status = loop {
            let ready: Vec<TaskId> = registry.ready_set().iter().map(|t| t.id.clone()).collect();

            if ready.is_empty() {
                break Self::terminal_status(registry);
            }

            if waves_executed >= self.config.max_waves {
                warn!(
                    "Reached the maximum of {} waves with {} tasks still ready",
                    self.config.max_waves,
                    ready.len()
                );
                break RunStatus::WaveLimitExceeded;
            }

            waves_executed += 1;
            self.emit_event(SchedulerEvent::WaveStarted {
                wave: waves_executed,
                task_ids: ready.clone(),
            });

            self.execute_wave(registry, &ready, goal, &board, &permits, waves_executed)
                .await?;
        };

        self.emit_event(SchedulerEvent::RunFinished {
            run_id,
            status: status.clone(),
            waves_executed,
        });

        Ok(RunReport {
            run_id,
            status,
            waves_executed,
            progress: registry.progress(),
            summary: build_summary(registry),
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn terminal_status(registry: &TaskRegistry) -> RunStatus {
        if registry.is_all_completed() {
            RunStatus::Completed
        } else if registry.has_any_failed() {
            RunStatus::SomeFailed
        } else {
            let stalled: Vec<TaskId> = registry
                .stalled_tasks()
                .iter()
                .map(|t| t.id.clone())
                .collect();
            error!(
                "No task is ready but {} remain pending: possible circular dependency",
                stalled.len()
            );
            RunStatus::Deadlock { stalled }
        }
    }

    async fn execute_wave(
        &self,
        registry: &mut TaskRegistry,
        ready: &[TaskId],
        goal: &str,
        board: &SharedMessageBoard,
        permits: &Arc<Semaphore>,
        wave: u32,
    ) -> Result<()> {
        for task_id in ready {
            registry.mark_running(task_id)?;
        }

        let mut dispatches = Vec::with_capacity(ready.len());
        for task_id in ready {
            let request = self.build_request(registry, task_id, goal, board)?;

            self.emit_event(SchedulerEvent::TaskDispatched {
                task_id: task_id.clone(),
                worker_id: request.worker_id.clone(),
                attempt: request.attempt,
            });

            dispatches.push(Dispatch {
                task_id: task_id.clone(),
                board: request.board.clone(),
                handle: self.spawn_invocation(request, board.clone(), Arc::clone(permits)),
            });
        }

        let (meta, handles): (Vec<_>, Vec<_>) = dispatches
            .into_iter()
            .map(|d| ((d.task_id, d.board), d.handle))
            .unzip();
        let results = join_all(handles).await;

        debug!("Wave {} barrier reached, applying {} results", wave, results.len());

        for ((task_id, worker_board), joined) in meta.into_iter().zip(results) {
            let outcome = match joined {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => ExecutionOutcome::Failure(e.to_string()),
                Err(join_error) => {
                    let reason = format!("Worker invocation aborted: {}", join_error);
                    error!("[{}] {}", worker_board.worker_id(), reason);
                    worker_board.report_completed(&reason).await;
                    ExecutionOutcome::Failure(reason)
                }
            };

            self.apply_outcome(registry, &task_id, outcome, wave)?;
        }

        Ok(())
    }

    /// Request without peer updates; those are read once a permit is held
    fn build_request(
        &self,
        registry: &TaskRegistry,
        task_id: &str,
        goal: &str,
        board: &SharedMessageBoard,
    ) -> Result<ExecutionRequest> {
        let task = registry.get(task_id)?;
        let worker_id = Self::worker_id(task_id);

        Ok(ExecutionRequest {
            task_id: task.id.clone(),
            board: board.worker_view(&worker_id, &task.description),
            worker_id,
            description: task.description.clone(),
            goal: goal.to_string(),
            retry_context: task.retry_context(),
            peer_updates: None,
            attempt: task.retry_count + 1,
        })
    }

    fn spawn_invocation(
        &self,
        mut request: ExecutionRequest,
        board: SharedMessageBoard,
        permits: Arc<Semaphore>,
    ) -> JoinHandle<Result<ExecutionOutcome, ExecutorError>> {
        let executor = Arc::clone(&self.executor);

        tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| ExecutorError::Other(format!("Semaphore closed: {}", e)))?;

            // Same-wave peers that finished while this task queued are included
            let updates = board.get_updates(Some(&request.worker_id)).await;
            request.peer_updates = (!is_no_updates(&updates)).then_some(updates);

            let worker_board = request.board.clone();
            let worker_id = request.worker_id.clone();
            debug!(
                "[{}] acquired permit, running on {} executor",
                worker_id,
                executor.executor_type()
            );

            let result = executor.execute(request).await;
            match &result {
                Ok(outcome) => worker_board.report_completed(outcome.text()).await,
                Err(e) => {
                    error!("[{}] executor error: {}", worker_id, e);
                    worker_board.report_completed(&e.to_string()).await;
                }
            }
            result
        })
    }

    fn apply_outcome(
        &self,
        registry: &mut TaskRegistry,
        task_id: &str,
        outcome: ExecutionOutcome,
        wave: u32,
    ) -> Result<()> {
        match outcome {
            ExecutionOutcome::Success(result) => {
                registry.mark_completed(task_id, result)?;
                self.emit_event(SchedulerEvent::TaskCompleted {
                    task_id: task_id.to_string(),
                    wave,
                });
            }
            ExecutionOutcome::Failure(reason) => {
                let reason = if reason.trim().is_empty() {
                    "worker reported failure without details".to_string()
                } else {
                    reason
                };

                match registry.mark_failed(task_id, reason.clone())? {
                    FailureDisposition::Retrying { attempt, remaining } => {
                        self.emit_event(SchedulerEvent::TaskRetrying {
                            task_id: task_id.to_string(),
                            reason,
                            next_attempt: attempt,
                            remaining,
                        });
                    }
                    FailureDisposition::Exhausted { attempts } => {
                        self.emit_event(SchedulerEvent::TaskFailed {
                            task_id: task_id.to_string(),
                            reason,
                            attempts,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Emit scheduler event to all handlers
    fn emit_event(&self, event: SchedulerEvent) {
        for handler in &self.event_handlers {
            if let Err(e) = handler.handle_event(&event) {
                error!("Event handler error: {}", e);
            }
        }
    }
}

impl fmt::Debug for WaveScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaveScheduler")
            .field("config", &self.config)
            .field("executor", &self.executor.executor_type())
            .field("event_handlers", &self.event_handlers.len())
            .finish()
    }
}

/// Convenience wrapper: replace the registry contents from JSON and run
pub async fn run_json(
    scheduler: &WaveScheduler,
    registry: &mut TaskRegistry,
    tasks_json: &str,
    goal: &str,
) -> Result<RunReport> {
    let count = registry.replace_from_json(tasks_json)?;
    info!("Loaded {} tasks", count);
    scheduler.run(registry, goal).await
}

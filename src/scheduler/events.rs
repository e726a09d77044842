use crate::scheduler::RunStatus;
use crate::task::TaskId;
use anyhow::Result;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events emitted while a scheduling run progresses
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    RunStarted {
        run_id: Uuid,
        task_count: usize,
    },
    WaveStarted {
        wave: u32,
        task_ids: Vec<TaskId>,
    },
    TaskDispatched {
        task_id: TaskId,
        worker_id: String,
        attempt: u32,
    },
    TaskCompleted {
        task_id: TaskId,
        wave: u32,
    },
    TaskRetrying {
        task_id: TaskId,
        reason: String,
        next_attempt: u32,
        remaining: u32,
    },
    TaskFailed {
        task_id: TaskId,
        reason: String,
        attempts: u32,
    },
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
        waves_executed: u32,
    },
}

/// Handler for scheduler events
pub trait SchedulerEventHandler {
    fn handle_event(&self, event: &SchedulerEvent) -> Result<()>;
}

/// Logs every scheduler event through `tracing`
pub struct LoggingEventHandler;

impl SchedulerEventHandler for LoggingEventHandler {
    fn handle_event(&self, event: &SchedulerEvent) -> Result<()> {
        match event {
            SchedulerEvent::RunStarted { run_id, task_count } => {
                info!("Run {} started with {} tasks", run_id, task_count);
            }
            SchedulerEvent::WaveStarted { wave, task_ids } => {
                info!(
                    "Wave {}: dispatching {} tasks [{}]",
                    wave,
                    task_ids.len(),
                    task_ids.join(", ")
                );
            }
            SchedulerEvent::TaskDispatched {
                task_id,
                worker_id,
                attempt,
            } => {
                info!("[{}] task {} dispatched (attempt {})", worker_id, task_id, attempt);
            }
            SchedulerEvent::TaskCompleted { task_id, wave } => {
                info!("Task {} completed in wave {}", task_id, wave);
            }
            SchedulerEvent::TaskRetrying {
                task_id,
                reason,
                next_attempt,
                remaining,
            } => {
                warn!(
                    "Task {} failed: {} (attempt {} next, {} left)",
                    task_id, reason, next_attempt, remaining
                );
            }
            SchedulerEvent::TaskFailed {
                task_id,
                reason,
                attempts,
            } => {
                error!(
                    "Task {} failed permanently after {} attempts: {}",
                    task_id, attempts, reason
                );
            }
            SchedulerEvent::RunFinished {
                run_id,
                status,
                waves_executed,
            } => {
                info!(
                    "Run {} finished after {} waves: {}",
                    run_id, waves_executed, status
                );
            }
        }
        Ok(())
    }
}

//! # taskwave
//!
//! A dependency-aware, wave-based concurrent task scheduler.
//!
//! A caller supplies a list of interdependent tasks and an execution
//! capability. taskwave runs every task whose dependencies are satisfied in
//! parallel waves, retries failures up to a bound, lets concurrently running
//! workers see each other's progress, and produces a final report.
//!
//! ## Architecture Overview
//!
//! - **[`task`]**: task model, registry, dependency resolution, and reports
//! - **[`board`]**: shared progress board for workers running side by side
//! - **[`executor`]**: the worker capability and a command-line implementation
//! - **[`scheduler`]**: the wave loop tying the pieces together
//! - **[`cli`]**: argument parsing, configuration discovery, and task list files
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use taskwave::{CommandWorker, CommandWorkerConfig, SchedulerConfig, WaveScheduler};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SchedulerConfig::default();
//!     let worker = CommandWorker::new(CommandWorkerConfig::new(
//!         "sh",
//!         vec!["-c".to_string(), "echo \"done: $TASKWAVE_TASK\"".to_string()],
//!     ))?;
//!
//!     let mut registry = config.new_registry();
//!     registry.replace_from_json(
//!         r#"[
//!             {"id": "1", "description": "Collect sources"},
//!             {"id": "2", "description": "Summarize", "dependencies": ["1"]}
//!         ]"#,
//!     )?;
//!
//!     let scheduler = WaveScheduler::new(config, Arc::new(worker));
//!     let report = scheduler.run(&mut registry, "Write a short brief").await?;
//!
//!     println!("{}", report.summary);
//!     Ok(())
//! }
//! ```

/// Task model, registry, and reporting.
///
/// The registry stores tasks in insertion order, computes the ready set, and
/// applies the retry state machine. Reports are pure functions of a registry.
pub mod task;

/// Shared message board used by concurrently running workers.
pub mod board;

/// Worker execution capability.
///
/// Defines the [`WorkerExecutor`] trait the scheduler dispatches to, plus
/// [`CommandWorker`], which runs an external program per task.
pub mod executor;

/// Wave-based scheduling of a task registry.
pub mod scheduler;

/// Command-line interface support.
pub mod cli;

/// File and directory names used for configuration discovery.
pub mod env;

pub use board::{BoardMessage, MessageStatus, SharedMessageBoard, WorkerBoard};
pub use executor::{
    CommandWorker, CommandWorkerConfig, ExecutionOutcome, ExecutionRequest, ExecutorError,
    WorkerExecutor, classify_output,
};
pub use scheduler::{
    LoggingEventHandler, RunReport, RunStatus, SchedulerConfig, SchedulerEvent,
    SchedulerEventHandler, WavePlan, WaveScheduler, plan_waves,
};
pub use task::{
    FailureDisposition, RegistryError, Task, TaskId, TaskList, TaskRegistry, TaskStatus,
    build_summary, format_task_list,
};

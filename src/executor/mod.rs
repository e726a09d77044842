//! # Worker Execution Abstraction
//!
//! The scheduler treats task execution as an opaque capability. This module
//! defines that capability and ships one concrete implementation.
//!
//! ## Core Components
//!
//! - **[`WorkerExecutor`]**: the capability: one task in, success or failure text out
//! - **[`ExecutionRequest`]**: everything a worker gets for one attempt
//! - **[`ExecutionOutcome`]**: success or failure with the worker's text
//! - **[`CommandWorker`]**: runs an external program per task on the host
//!
//! ## Faults versus failures
//!
//! A worker that ran and could not do its job returns
//! `Ok(ExecutionOutcome::Failure(..))`. A worker that could not run at all
//! (missing program, I/O error, timeout) returns `Err(ExecutorError)`. The
//! scheduler turns both into a recorded task failure; neither stops a wave.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use taskwave::executor::{ExecutionOutcome, ExecutionRequest, ExecutorError, WorkerExecutor};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl WorkerExecutor for Echo {
//!     async fn execute(
//!         &self,
//!         request: ExecutionRequest,
//!     ) -> Result<ExecutionOutcome, ExecutorError> {
//!         request.board.report_progress("echoing").await;
//!         Ok(ExecutionOutcome::Success(request.description))
//!     }
//!
//!     fn executor_type(&self) -> &'static str {
//!         "echo"
//!     }
//! }
//! ```

use crate::board::WorkerBoard;
use crate::task::TaskId;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Command worker configuration.
///
/// Defines [`CommandWorkerConfig`], the serializable description of the
/// program a [`CommandWorker`] runs for each task.
pub mod config;

/// Host process execution of tasks.
///
/// Implements [`CommandWorker`] on top of `tokio::process::Command`, with
/// progress lines relayed to the shared message board.
pub mod host;

pub use config::CommandWorkerConfig;
pub use host::CommandWorker;

/// Everything a worker receives for one attempt at a task
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub task_id: TaskId,
    pub worker_id: String,
    pub description: String,
    /// The overall goal of the run
    pub goal: String,
    /// Formatted failure history, present on retries only
    pub retry_context: Option<String>,
    /// Other workers' board messages at dispatch time, if any
    pub peer_updates: Option<String>,
    /// 1-based attempt number
    pub attempt: u32,
    /// This worker's handle on the shared message board
    pub board: WorkerBoard,
}

impl ExecutionRequest {
    /// Render the request as a single prompt for model-backed workers
    pub fn render_prompt(&self) -> String {
        let mut prompt = format!("[User's Ultimate Goal]\n{}\n\n", self.goal);

        if let Some(ref updates) = self.peer_updates {
            prompt.push_str(&format!("[Other Workers' Current Progress]\n{}\n\n", updates));
        }

        prompt.push_str(&format!(
            "[Current Task]\nPlease execute the following task:\n\n{}",
            self.description
        ));

        if let Some(ref retry) = self.retry_context {
            prompt.push_str("\n\n");
            prompt.push_str(retry);
        }

        prompt
    }

    pub fn is_retry(&self) -> bool {
        self.retry_context.is_some()
    }
}

/// Result of one attempt at a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success(String),
    Failure(String),
}

impl ExecutionOutcome {
    /// Classify free-form worker output, see [`classify_output`]
    pub fn from_output(output: impl Into<String>) -> Self {
        let output = output.into();
        if classify_output(&output) {
            Self::Success(output)
        } else {
            Self::Failure(output)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Success(text) | Self::Failure(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Success(text) | Self::Failure(text) => text,
        }
    }
}

static STATUS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(SUCCESS|FAILED)\s*[:：]").expect("status line pattern is valid")
});

/// Decide whether free-form worker output reports success.
///
/// The first line wins when it starts with `SUCCESS:` or `FAILED:` (full-width
/// colons accepted). Otherwise output starting with `ERROR:` is a failure and
/// anything else counts as success.
pub fn classify_output(output: &str) -> bool {
    let trimmed = output.trim();
    let first_line = trimmed.lines().next().unwrap_or("");

    if let Some(captures) = STATUS_LINE.captures(first_line) {
        return captures[1].eq_ignore_ascii_case("SUCCESS");
    }

    !trimmed.to_uppercase().starts_with("ERROR:")
}

/// Errors raised when a worker could not run
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The configured program could not be resolved
    #[error("Program '{program}' not found: {reason}")]
    ProgramNotFound { program: String, reason: String },

    /// The worker did not finish in time
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// The worker started but could not be driven to completion
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// The execution capability the scheduler dispatches tasks to.
///
/// Implementations must be callable concurrently: the scheduler shares one
/// instance across every invocation of a wave.
#[async_trait]
pub trait WorkerExecutor: Send + Sync {
    /// Attempt one task
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionOutcome, ExecutorError>;

    /// Executor type name for logging
    fn executor_type(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::SharedMessageBoard;

    fn request(retry_context: Option<String>, peer_updates: Option<String>) -> ExecutionRequest {
        let board = SharedMessageBoard::new();
        ExecutionRequest {
            task_id: "1".to_string(),
            worker_id: "Worker-1".to_string(),
            description: "Download the report".to_string(),
            goal: "Summarize the quarterly report".to_string(),
            retry_context,
            peer_updates,
            attempt: 1,
            board: board.worker_view("Worker-1", "Download the report"),
        }
    }

    #[test]
    fn test_classify_output() {
        assert!(classify_output("SUCCESS: done"));
        assert!(classify_output("success：done"));
        assert!(!classify_output("FAILED: could not connect"));
        assert!(!classify_output("  failed : nope\nmore"));
        assert!(!classify_output("FAILED：全角"));
        assert!(!classify_output("Error: disk full"));
        assert!(classify_output("Here is the answer"));
        assert!(classify_output(""));
        // Only the first line decides
        assert!(classify_output("All good\nFAILED: not a status line"));
    }

    #[test]
    fn test_outcome_from_output() {
        assert_eq!(
            ExecutionOutcome::from_output("FAILED: nope"),
            ExecutionOutcome::Failure("FAILED: nope".to_string())
        );
        let ok = ExecutionOutcome::from_output("result text");
        assert!(ok.is_success());
        assert_eq!(ok.text(), "result text");
    }

    #[test]
    fn test_render_prompt_first_attempt() {
        let prompt = request(None, None).render_prompt();
        assert!(prompt.starts_with("[User's Ultimate Goal]\nSummarize the quarterly report"));
        assert!(prompt.contains(
            "[Current Task]\nPlease execute the following task:\n\nDownload the report"
        ));
        assert!(!prompt.contains("Other Workers"));
        assert!(!prompt.contains("retry"));
    }

    #[test]
    fn test_render_prompt_with_context() {
        let req = request(
            Some("This is retry attempt 1. Previous failures:\n  Attempt 1: 404\n".to_string()),
            Some("=== Other Workers' Progress ===".to_string()),
        );
        assert!(req.is_retry());

        let prompt = req.render_prompt();
        assert!(
            prompt.contains("[Other Workers' Current Progress]\n=== Other Workers' Progress ===")
        );
        assert!(prompt.contains("Attempt 1: 404"));
        let goal_at = prompt.find("[User's Ultimate Goal]").unwrap();
        let task_at = prompt.find("[Current Task]").unwrap();
        let retry_at = prompt.find("This is retry attempt").unwrap();
        assert!(goal_at < task_at && task_at < retry_at);
    }
}

//! Native host execution of tasks.
//!
//! Runs the configured program once per task attempt using
//! `tokio::process::Command` and streams its stdout line by line.

use super::{
    CommandWorkerConfig, ExecutionOutcome, ExecutionRequest, ExecutorError, WorkerExecutor,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Stdout lines with this prefix are relayed to the message board
pub const PROGRESS_PREFIX: &str = "PROGRESS:";

/// Runs an external program for each task.
///
/// The program receives the attempt through `TASKWAVE_*` environment
/// variables. Its stdout becomes the task result; a non-zero exit status is
/// a task failure.
#[derive(Debug, Clone)]
pub struct CommandWorker {
    config: CommandWorkerConfig,
    program_path: PathBuf,
}

impl CommandWorker {
    /// Resolve the configured program on `PATH` and build the worker
    pub fn new(config: CommandWorkerConfig) -> Result<Self, ExecutorError> {
        let program_path =
            which::which(&config.program).map_err(|e| ExecutorError::ProgramNotFound {
                program: config.program.clone(),
                reason: e.to_string(),
            })?;

        info!(
            "Command worker ready: {} ({})",
            config.display_command(),
            program_path.display()
        );

        Ok(Self {
            config,
            program_path,
        })
    }

    pub fn config(&self) -> &CommandWorkerConfig {
        &self.config
    }

    fn build_command(&self, request: &ExecutionRequest) -> Command {
        let mut command = Command::new(&self.program_path);
        command
            .args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = self.config.working_dir {
            command.current_dir(dir);
        }

        for (key, value) in &self.config.env {
            command.env(key, value);
        }

        command
            .env("TASKWAVE_TASK_ID", &request.task_id)
            .env("TASKWAVE_WORKER_ID", &request.worker_id)
            .env("TASKWAVE_TASK", &request.description)
            .env("TASKWAVE_GOAL", &request.goal)
            .env("TASKWAVE_ATTEMPT", request.attempt.to_string())
            .env(
                "TASKWAVE_PEER_UPDATES",
                request.peer_updates.as_deref().unwrap_or(""),
            )
            .env("TASKWAVE_PROMPT", request.render_prompt());

        if let Some(ref retry) = request.retry_context {
            command.env("TASKWAVE_RETRY_CONTEXT", retry);
        }

        command
    }

    async fn run_streaming(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionOutcome, ExecutorError> {
        let mut child = self.build_command(request).spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutorError::ExecutionFailed("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutorError::ExecutionFailed("Failed to capture stderr".to_string()))?;

        let mut stdout_reader = BufReader::new(stdout);
        let mut stderr_reader = BufReader::new(stderr);
        // Raw bytes: worker output is not required to be valid UTF-8
        let mut stdout_line = Vec::new();
        let mut stderr_line = Vec::new();
        let mut stdout_done = false;
        let mut stderr_done = false;

        let mut output = String::new();
        let mut errors = String::new();

        while !(stdout_done && stderr_done) {
            tokio::select! {
                read = stdout_reader.read_until(b'\n', &mut stdout_line), if !stdout_done => {
                    if read? == 0 {
                        stdout_done = true;
                    } else {
                        let text = String::from_utf8_lossy(&stdout_line).into_owned();
                        let line = text.trim_end_matches(['\r', '\n']);
                        match line.strip_prefix(PROGRESS_PREFIX) {
                            Some(progress) => {
                                debug!("[{}] progress: {}", request.worker_id, progress.trim());
                                request.board.report_progress(progress.trim()).await;
                            }
                            None => {
                                output.push_str(line);
                                output.push('\n');
                            }
                        }
                        stdout_line.clear();
                    }
                }
                read = stderr_reader.read_until(b'\n', &mut stderr_line), if !stderr_done => {
                    if read? == 0 {
                        stderr_done = true;
                    } else {
                        errors.push_str(&String::from_utf8_lossy(&stderr_line));
                        stderr_line.clear();
                    }
                }
            }
        }

        let status = child.wait().await?;
        let output = output.trim_end().to_string();

        if status.success() {
            return Ok(ExecutionOutcome::from_output(output));
        }

        let code = status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let detail = match errors.trim() {
            "" => output.as_str(),
            stderr => stderr,
        };
        warn!("[{}] worker exited with status {}", request.worker_id, code);
        Ok(ExecutionOutcome::Failure(format!("exit status {}: {}", code, detail)))
    }
}

#[async_trait]
impl WorkerExecutor for CommandWorker {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionOutcome, ExecutorError> {
        debug!(
            "[{}] running {} for task {} (attempt {})",
            request.worker_id,
            self.config.display_command(),
            request.task_id,
            request.attempt
        );

        let start = Instant::now();

        let outcome = match self.config.timeout() {
            Some(timeout) => tokio::time::timeout(timeout, self.run_streaming(&request))
                .await
                .map_err(|_| ExecutorError::Timeout(timeout))??,
            None => self.run_streaming(&request).await?,
        };

        debug!(
            "[{}] finished in {:?} (success: {})",
            request.worker_id,
            start.elapsed(),
            outcome.is_success()
        );

        Ok(outcome)
    }

    fn executor_type(&self) -> &'static str {
        "command"
    }
}

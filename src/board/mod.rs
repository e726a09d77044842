//! # Shared Message Board
//!
//! Lets workers that run in the same wave see each other's progress without a
//! central coordinator deciding what they exchange.
//!
//! - **[`SharedMessageBoard`]**: the board itself, cloned cheaply into every worker
//! - **[`WorkerBoard`]**: a worker's view of the board, bound to its worker id
//! - **[`BoardMessage`]**: one posted entry
//!
//! Every post and read goes through a single mutex that is held only while the
//! message list is mutated or copied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Maximum number of characters kept from a posted message body
pub const MESSAGE_CHAR_LIMIT: usize = 500;

/// Returned by [`SharedMessageBoard::get_updates`] when no other worker has posted
pub const NO_UPDATES: &str = "No updates from other workers yet.";

/// Lifecycle marker of a board message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    InProgress,
    Completed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            Self::InProgress => "🔄",
            Self::Completed => "✅",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardMessage {
    pub worker_id: String,
    pub task_description: String,
    pub message: String,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
}

/// Thread-safe store of per-worker progress messages for one scheduling run
#[derive(Debug, Clone, Default)]
pub struct SharedMessageBoard {
    messages: Arc<Mutex<Vec<BoardMessage>>>,
}

impl SharedMessageBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, dropping the worker's previous in-progress entry.
    ///
    /// Completed messages are never removed, so a worker keeps at most one
    /// in-progress entry plus its completed history.
    pub async fn post(
        &self,
        worker_id: &str,
        task_description: &str,
        message: &str,
        status: MessageStatus,
    ) {
        let entry = BoardMessage {
            worker_id: worker_id.to_string(),
            task_description: task_description.to_string(),
            message: truncate_chars(message, MESSAGE_CHAR_LIMIT),
            status,
            timestamp: Utc::now(),
        };

        let mut messages = self.messages.lock().await;
        messages.retain(|m| !(m.worker_id == worker_id && m.status == MessageStatus::InProgress));
        messages.push(entry);

        debug!(
            "[{}] posted {} message ({} on board)",
            worker_id,
            status.as_str(),
            messages.len()
        );
    }

    /// Snapshot of messages from every worker except `exclude_worker_id`
    pub async fn messages_excluding(&self, exclude_worker_id: Option<&str>) -> Vec<BoardMessage> {
        let messages = self.messages.lock().await;
        messages
            .iter()
            .filter(|m| Some(m.worker_id.as_str()) != exclude_worker_id)
            .cloned()
            .collect()
    }

    /// Messages from other workers, formatted for a worker's next decision.
    ///
    /// Returns [`NO_UPDATES`] when there is nothing to show.
    pub async fn get_updates(&self, exclude_worker_id: Option<&str>) -> String {
        let messages = self.messages_excluding(exclude_worker_id).await;
        format_updates(&messages)
    }

    /// Full snapshot of the board
    pub async fn snapshot(&self) -> Vec<BoardMessage> {
        self.messages.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }

    /// Bind a worker's view of this board
    pub fn worker_view(&self, worker_id: &str, task_description: &str) -> WorkerBoard {
        WorkerBoard {
            board: self.clone(),
            worker_id: worker_id.to_string(),
            task_description: task_description.to_string(),
        }
    }
}

/// Whether a formatted update string is the empty-board sentinel
pub fn is_no_updates(updates: &str) -> bool {
    updates == NO_UPDATES
}

fn format_updates(messages: &[BoardMessage]) -> String {
    if messages.is_empty() {
        return NO_UPDATES.to_string();
    }

    let mut lines = vec!["=== Other Workers' Progress ===".to_string()];
    for m in messages {
        lines.push(format!(
            "{} [{}] Task: {}",
            m.status.icon(),
            m.worker_id,
            m.task_description
        ));
        lines.push(format!("   Result: {}", m.message));
        lines.push(String::new());
    }
    lines.join("\n")
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

/// A single worker's handle on the board.
///
/// Executors receive this instead of the board so that everything they post is
/// attributed to their own worker id.
#[derive(Debug, Clone)]
pub struct WorkerBoard {
    board: SharedMessageBoard,
    worker_id: String,
    task_description: String,
}

impl WorkerBoard {
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Share intermediate progress with the other workers
    pub async fn report_progress(&self, message: &str) {
        self.board
            .post(
                &self.worker_id,
                &self.task_description,
                message,
                MessageStatus::InProgress,
            )
            .await;
    }

    /// Post this worker's terminal message for its task
    pub async fn report_completed(&self, message: &str) {
        self.board
            .post(
                &self.worker_id,
                &self.task_description,
                message,
                MessageStatus::Completed,
            )
            .await;
    }

    /// See what the other workers have done or are doing
    pub async fn check_others_progress(&self) -> String {
        self.board.get_updates(Some(&self.worker_id)).await
    }
}

//! Human-readable rendering of registry state.
//!
//! Both functions are pure and can be called at any point of a run.

use crate::task::registry::TaskRegistry;
use crate::task::types::{Task, TaskStatus};

/// Number of result lines shown per completed task
pub const RESULT_PREVIEW_LINES: usize = 5;

const LIST_RULE_WIDTH: usize = 40;
const REPORT_RULE_WIDTH: usize = 50;

pub const VERDICT_ALL_COMPLETED: &str = "All tasks completed successfully!";
pub const VERDICT_SOME_FAILED: &str = "Some tasks failed. Please review the failure reasons.";
pub const VERDICT_IN_PROGRESS: &str = "Tasks in progress...";

/// Overall verdict for the current registry state
pub fn verdict(registry: &TaskRegistry) -> &'static str {
    if registry.is_all_completed() {
        VERDICT_ALL_COMPLETED
    } else if registry.has_any_failed() {
        VERDICT_SOME_FAILED
    } else {
        VERDICT_IN_PROGRESS
    }
}

/// Current task list with status icons, dependencies, retries and progress
pub fn format_task_list(registry: &TaskRegistry) -> String {
    if registry.is_empty() {
        return "Task list is empty".to_string();
    }

    let mut lines = vec!["Task List".to_string(), "=".repeat(LIST_RULE_WIDTH)];

    for task in registry.tasks() {
        let mut line = format!("{} [{}] {}", task.status.icon(), task.id, task.description);
        if !task.dependencies.is_empty() {
            line.push_str(&format!(" (Dependencies: {})", task.dependencies.join(", ")));
        }
        if task.retry_count > 0 {
            line.push_str(&format!(" [Retry: {}/{}]", task.retry_count, task.max_retries));
        }
        lines.push(line);
    }

    let progress = registry.progress();
    lines.push("=".repeat(LIST_RULE_WIDTH));
    lines.push(format!(
        "Progress: {}/{} ({:.1}%)",
        progress.completed, progress.total, progress.completion_percentage
    ));

    lines.join("\n")
}

/// Final execution summary: completed and failed tasks plus a verdict
pub fn build_summary(registry: &TaskRegistry) -> String {
    let mut lines = vec![
        "=".repeat(REPORT_RULE_WIDTH),
        "📊 Task Execution Summary Report".to_string(),
        "=".repeat(REPORT_RULE_WIDTH),
        String::new(),
    ];

    let completed: Vec<&Task> = registry
        .tasks()
        .filter(|t| t.status == TaskStatus::Completed)
        .collect();
    let failed: Vec<&Task> = registry
        .tasks()
        .filter(|t| t.status == TaskStatus::Failed)
        .collect();

    lines.push(format!(
        "✅ Completed Tasks: {}/{}",
        completed.len(),
        registry.len()
    ));
    lines.push("-".repeat(LIST_RULE_WIDTH));
    for task in &completed {
        lines.push(format!("  [{}] {}", task.id, task.description));
        lines.extend(result_preview(&task.result));
    }

    if !failed.is_empty() {
        lines.push(String::new());
        lines.push(format!("❌ Failed Tasks: {}", failed.len()));
        lines.push("-".repeat(LIST_RULE_WIDTH));
        for task in &failed {
            lines.push(format!("  [{}] {}", task.id, task.description));
            lines.push(format!("      Retry count: {}", task.retry_count));
            if let Some(reason) = task.last_failure() {
                lines.push(format!("      Last failure reason: {}", reason));
            }
        }
    }

    lines.push(String::new());
    lines.push("=".repeat(REPORT_RULE_WIDTH));
    lines.push(verdict(registry).to_string());

    lines.join("\n")
}

fn result_preview(result: &str) -> Vec<String> {
    if result.is_empty() {
        return Vec::new();
    }

    let result_lines: Vec<&str> = result.lines().collect();
    let mut preview: Vec<String> = result_lines
        .iter()
        .take(RESULT_PREVIEW_LINES)
        .map(|line| format!("      → {}", line))
        .collect();

    if result_lines.len() > RESULT_PREVIEW_LINES {
        preview.push(format!(
            "      ... ({} more lines)",
            result_lines.len() - RESULT_PREVIEW_LINES
        ));
    }

    preview
}

use super::*;

// Helper to build a registry from a JSON task list
fn registry_from(json: &str) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.replace_from_json(json).unwrap();
    registry
}

fn ready_ids(registry: &TaskRegistry) -> Vec<String> {
    registry.ready_set().iter().map(|t| t.id.clone()).collect()
}

#[test]
fn test_task_creation() {
    let task = Task::new("1", "Search for relevant information");

    assert_eq!(task.id, "1");
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.is_pending());
    assert!(!task.is_terminal());
    assert_eq!(task.retry_count, 0);
    assert_eq!(task.max_retries, DEFAULT_MAX_RETRIES);
    assert!(task.result.is_empty());
    assert!(task.failure_history.is_empty());
    assert!(task.retry_context().is_none());
}

#[test]
fn test_task_list_parsing_defaults() {
    let list = TaskList::from_json(
        r#"[
            {"description": "first"},
            {"id": 7, "description": "second", "dependencies": [1]},
            {"id": "x", "description": "third", "dependencies": ["7"], "max_retries": 5}
        ]"#,
    )
    .unwrap();

    let specs = list.specs();
    assert_eq!(specs.len(), 3);
    assert_eq!(specs[0].id, "1");
    assert!(specs[0].dependencies.is_empty());
    assert_eq!(specs[1].id, "7");
    assert_eq!(specs[1].dependencies, vec!["1".to_string()]);
    assert_eq!(specs[2].max_retries, Some(5));
}

#[test]
fn test_task_list_rejects_malformed_input() {
    assert!(matches!(
        TaskList::from_json("not json"),
        Err(RegistryError::InvalidTaskList(_))
    ));
    assert!(matches!(
        TaskList::from_json(r#"{"id": "1", "description": "object"}"#),
        Err(RegistryError::InvalidTaskList(_))
    ));
    assert!(matches!(
        TaskList::from_json(r#"[{"id": "1"}]"#),
        Err(RegistryError::InvalidTaskList(_))
    ));
    assert!(matches!(
        TaskList::from_json(r#"[{"id": "1", "description": "d", "dependencies": [true]}]"#),
        Err(RegistryError::InvalidTaskList(_))
    ));
    assert!(matches!(
        TaskList::from_json(r#"[{"id": "1", "description": "d", "max_retries": 0}]"#),
        Err(RegistryError::InvalidTaskList(_))
    ));
}

#[test]
fn test_malformed_input_leaves_registry_untouched() {
    let mut registry = registry_from(r#"[{"id": "1", "description": "keep me"}]"#);
    registry.mark_running("1").unwrap();

    let result = registry.replace_from_json(r#"[{"id": "2"}]"#);
    assert!(result.is_err());

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("1").unwrap().status, TaskStatus::Running);
}

#[test]
fn test_replace_all_clears_prior_state() {
    let mut registry = registry_from(
        r#"[{"id": "1", "description": "A"}, {"id": "2", "description": "B"}]"#,
    );
    registry.mark_running("1").unwrap();
    registry.mark_failed("1", "boom").unwrap();

    registry
        .replace_from_json(r#"[{"id": "1", "description": "A again"}]"#)
        .unwrap();

    assert_eq!(registry.len(), 1);
    let task = registry.get("1").unwrap();
    assert_eq!(task.description, "A again");
    assert_eq!(task.retry_count, 0);
    assert!(task.failure_history.is_empty());
    assert!(!registry.contains("2"));
}

#[test]
fn test_duplicate_ids_last_write_wins() {
    let registry = registry_from(
        r#"[
            {"id": "1", "description": "first version"},
            {"id": "2", "description": "other"},
            {"id": "1", "description": "second version"}
        ]"#,
    );

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get("1").unwrap().description, "second version");
    let order: Vec<&str> = registry.tasks().map(|t| t.id.as_str()).collect();
    assert_eq!(order, vec!["1", "2"]);
}

#[test]
fn test_unknown_task_operations_error() {
    let mut registry = TaskRegistry::new();

    assert_eq!(
        registry.mark_running("missing"),
        Err(RegistryError::TaskNotFound("missing".to_string()))
    );
    assert!(matches!(
        registry.mark_completed("missing", "done"),
        Err(RegistryError::TaskNotFound(_))
    ));
    assert!(matches!(
        registry.mark_failed("missing", "why"),
        Err(RegistryError::TaskNotFound(_))
    ));
    assert!(matches!(
        registry.can_retry("missing"),
        Err(RegistryError::TaskNotFound(_))
    ));
}

#[test]
fn test_ready_set_respects_dependencies() {
    let mut registry = registry_from(
        r#"[
            {"id": "1", "description": "A"},
            {"id": "2", "description": "B", "dependencies": ["1"]},
            {"id": "3", "description": "C"}
        ]"#,
    );

    assert_eq!(ready_ids(&registry), vec!["1", "3"]);
    assert_eq!(registry.next_ready().unwrap().id, "1");

    registry.mark_running("1").unwrap();
    assert_eq!(ready_ids(&registry), vec!["3"]);

    registry.mark_completed("1", "A done").unwrap();
    assert_eq!(ready_ids(&registry), vec!["2", "3"]);
}

#[test]
fn test_unknown_dependency_is_treated_as_satisfied() {
    let registry = registry_from(
        r#"[{"id": "2", "description": "B", "dependencies": ["1"]}]"#,
    );

    assert_eq!(ready_ids(&registry), vec!["2"]);
    assert_eq!(
        registry.unknown_dependencies(),
        vec![("2".to_string(), "1".to_string())]
    );
    assert!(registry.stalled_tasks().is_empty());
}

#[test]
fn test_cycle_yields_empty_ready_set() {
    let registry = registry_from(
        r#"[
            {"id": "1", "description": "A", "dependencies": ["2"]},
            {"id": "2", "description": "B", "dependencies": ["1"]}
        ]"#,
    );

    assert!(registry.ready_set().is_empty());
    assert!(registry.next_ready().is_none());
    assert_eq!(registry.stalled_tasks().len(), 2);
    assert!(!registry.is_all_completed());
    assert!(!registry.has_any_failed());
}

#[test]
fn test_retry_then_success() {
    let mut registry = registry_from(r#"[{"id": "1", "description": "flaky"}]"#);

    registry.mark_running("1").unwrap();
    assert_eq!(
        registry.mark_failed("1", "first").unwrap(),
        FailureDisposition::Retrying {
            attempt: 2,
            remaining: 2
        }
    );
    assert_eq!(ready_ids(&registry), vec!["1"]);

    registry.mark_running("1").unwrap();
    registry.mark_failed("1", "second").unwrap();
    registry.mark_running("1").unwrap();
    registry.mark_completed("1", "finally").unwrap();

    let task = registry.get("1").unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.retry_count, 2);
    assert_eq!(task.failure_history, vec!["first", "second"]);
    assert_eq!(task.result, "finally");
}

#[test]
fn test_retry_exhaustion_is_terminal() {
    let mut registry = registry_from(r#"[{"id": "1", "description": "doomed"}]"#);

    for attempt in 1..=3 {
        registry.mark_running("1").unwrap();
        let disposition = registry.mark_failed("1", format!("failure {}", attempt)).unwrap();
        if attempt == 3 {
            assert_eq!(disposition, FailureDisposition::Exhausted { attempts: 3 });
        }
    }

    let task = registry.get("1").unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.retry_count, task.max_retries);
    assert!(!registry.can_retry("1").unwrap());
    assert!(registry.ready_set().is_empty());
    assert!(registry.has_any_failed());

    // Terminal states do not move
    assert!(matches!(
        registry.mark_failed("1", "again"),
        Err(RegistryError::InvalidTransition { .. })
    ));
    assert!(matches!(
        registry.mark_running("1"),
        Err(RegistryError::InvalidTransition { .. })
    ));
    assert_eq!(registry.get("1").unwrap().retry_count, 3);
}

#[test]
fn test_per_task_retry_bound_overrides_default() {
    let mut registry = TaskRegistry::with_max_retries(5);
    registry
        .replace_from_json(
            r#"[
                {"id": "a", "description": "A", "max_retries": 1},
                {"id": "b", "description": "B"}
            ]"#,
        )
        .unwrap();

    assert_eq!(registry.get("a").unwrap().max_retries, 1);
    assert_eq!(registry.get("b").unwrap().max_retries, 5);

    registry.mark_running("a").unwrap();
    assert!(matches!(
        registry.mark_failed("a", "once").unwrap(),
        FailureDisposition::Exhausted { attempts: 1 }
    ));
}

#[test]
fn test_pending_task_cannot_complete_or_fail() {
    let mut registry = registry_from(r#"[{"id": "1", "description": "not started"}]"#);

    assert_eq!(
        registry.mark_completed("1", "too early"),
        Err(RegistryError::InvalidTransition {
            id: "1".to_string(),
            from: TaskStatus::Pending,
            to: TaskStatus::Completed,
        })
    );
    assert!(matches!(
        registry.mark_failed("1", "too early"),
        Err(RegistryError::InvalidTransition {
            from: TaskStatus::Pending,
            ..
        })
    ));

    let task = registry.get("1").unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.retry_count, 0);
    assert!(task.failure_history.is_empty());
    assert!(task.result.is_empty());
}

#[test]
fn test_completed_task_cannot_fail() {
    let mut registry = registry_from(r#"[{"id": "1", "description": "done"}]"#);
    registry.mark_running("1").unwrap();
    registry.mark_completed("1", "ok").unwrap();

    assert!(matches!(
        registry.mark_failed("1", "late"),
        Err(RegistryError::InvalidTransition { .. })
    ));
    assert!(matches!(
        registry.mark_completed("1", "twice"),
        Err(RegistryError::InvalidTransition { .. })
    ));
    assert_eq!(registry.get("1").unwrap().result, "ok");
}

#[test]
fn test_default_retry_bound_can_change_after_install() {
    let mut registry = registry_from(
        r#"[{"id": "a", "description": "A", "max_retries": 4}, {"id": "b", "description": "B"}]"#,
    );
    assert_eq!(registry.get("b").unwrap().max_retries, DEFAULT_MAX_RETRIES);

    registry.set_default_max_retries(1);
    assert_eq!(registry.default_max_retries(), 1);
    assert_eq!(registry.get("a").unwrap().max_retries, 4);
    assert_eq!(registry.get("b").unwrap().max_retries, 1);

    registry.mark_running("b").unwrap();
    assert_eq!(
        registry.mark_failed("b", "once").unwrap(),
        FailureDisposition::Exhausted { attempts: 1 }
    );

    // Reinstalling uses the new default
    registry
        .replace_from_json(r#"[{"id": "c", "description": "C"}]"#)
        .unwrap();
    assert_eq!(registry.get("c").unwrap().max_retries, 1);
}

#[test]
fn test_description_is_kept_verbatim() {
    let registry = registry_from(r#"[{"id": "1", "description": "  indented\n  text  "}]"#);
    assert_eq!(registry.get("1").unwrap().description, "  indented\n  text  ");

    assert!(matches!(
        TaskList::from_json(r#"[{"id": "1", "description": " \t "}]"#),
        Err(RegistryError::InvalidTaskList(_))
    ));
}

#[test]
fn test_retry_context_lists_failures() {
    let mut task = Task::new("1", "flaky");
    task.retry_count = 2;
    task.failure_history = vec!["timeout".to_string(), "bad output".to_string()];

    let context = task.retry_context().unwrap();
    assert!(context.starts_with("This is retry attempt 2."));
    assert!(context.contains("  Attempt 1: timeout"));
    assert!(context.contains("  Attempt 2: bad output"));
    assert!(context.ends_with("Please try an alternative approach."));
}

#[test]
fn test_empty_registry_predicates() {
    let registry = TaskRegistry::new();
    assert!(registry.is_all_completed());
    assert!(!registry.has_any_failed());
    assert_eq!(format_task_list(&registry), "Task list is empty");
    assert_eq!(registry.progress().completion_percentage, 0.0);
}

#[test]
fn test_format_task_list() {
    let mut registry = registry_from(
        r#"[
            {"id": "1", "description": "Search"},
            {"id": "2", "description": "Download", "dependencies": ["1"]}
        ]"#,
    );
    registry.mark_running("1").unwrap();
    registry.mark_completed("1", "found").unwrap();
    registry.mark_running("2").unwrap();
    registry.mark_failed("2", "404").unwrap();

    let list = format_task_list(&registry);
    assert!(list.starts_with("Task List\n"));
    assert!(list.contains("✅ [1] Search"));
    assert!(list.contains("⬜ [2] Download (Dependencies: 1) [Retry: 1/3]"));
    assert!(list.ends_with("Progress: 1/2 (50.0%)"));
}

#[test]
fn test_build_summary_truncates_results() {
    let mut registry = registry_from(
        r#"[
            {"id": "1", "description": "Long output"},
            {"id": "2", "description": "Broken", "max_retries": 1}
        ]"#,
    );
    registry.mark_running("1").unwrap();
    registry
        .mark_completed("1", "l1\nl2\nl3\nl4\nl5\nl6\nl7")
        .unwrap();
    registry.mark_running("2").unwrap();
    registry.mark_failed("2", "disk full").unwrap();

    let summary = build_summary(&registry);
    assert!(summary.contains("✅ Completed Tasks: 1/2"));
    assert!(summary.contains("      → l5"));
    assert!(!summary.contains("      → l6"));
    assert!(summary.contains("      ... (2 more lines)"));
    assert!(summary.contains("❌ Failed Tasks: 1"));
    assert!(summary.contains("      Retry count: 1"));
    assert!(summary.contains("      Last failure reason: disk full"));
    assert!(summary.ends_with(report::VERDICT_SOME_FAILED));
}

#[test]
fn test_verdicts() {
    let mut registry = registry_from(r#"[{"id": "1", "description": "A"}]"#);
    assert_eq!(verdict(&registry), report::VERDICT_IN_PROGRESS);

    registry.mark_running("1").unwrap();
    registry.mark_completed("1", "").unwrap();
    assert_eq!(verdict(&registry), report::VERDICT_ALL_COMPLETED);
    assert!(!build_summary(&registry).contains("Failed Tasks"));
}

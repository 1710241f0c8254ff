//! Built-in function integration tests
//!
//! Runs every built-in through the registry against a temporary scratch dir

use beacon_realtime::tools::{DispatchError, FileActionError, FileActions, builtin_registry};
use serde_json::json;
use tempfile::TempDir;

fn scratch() -> TempDir {
    tempfile::tempdir().expect("temp dir")
}

#[test]
fn test_builtin_definitions() {
    let dir = scratch();
    let registry = builtin_registry(dir.path());

    let names: Vec<&str> = registry.names().collect();
    assert_eq!(
        names,
        vec![
            "cancel_calendar_event",
            "create_calendar_event",
            "create_file",
            "delete_file",
            "get_current_time",
            "open_browser",
            "update_file",
        ]
    );

    for definition in registry.definitions() {
        assert_eq!(definition.tool_type, "function");
        assert!(!definition.description.is_empty());
        assert_eq!(definition.parameters["type"], "object");
        assert_eq!(definition.parameters["additionalProperties"], false);
    }

    let create = registry.spec("create_file").unwrap().definition();
    assert_eq!(create.parameters["required"], json!(["file_name", "content"]));
}

#[tokio::test]
async fn test_file_lifecycle() {
    let dir = scratch();
    let registry = builtin_registry(dir.path());

    let created = registry
        .invoke(
            "create_file",
            json!({ "file_name": "notes/todo.md", "content": "buy milk" }),
        )
        .await
        .unwrap();
    assert_eq!(created["status"], "created");
    let path = dir.path().join("notes/todo.md");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "buy milk");

    let again = registry
        .invoke(
            "create_file",
            json!({ "file_name": "notes/todo.md", "content": "other" }),
        )
        .await
        .unwrap_err();
    assert_eq!(again.kind(), "handler_failure");
    assert!(again.to_string().contains("already exists"));

    registry
        .invoke(
            "update_file",
            json!({ "file_name": "notes/todo.md", "content": "buy oat milk" }),
        )
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "buy oat milk");

    let deleted = registry
        .invoke("delete_file", json!({ "file_name": "notes/todo.md" }))
        .await
        .unwrap();
    assert_eq!(deleted["status"], "deleted");
    assert!(!path.exists());

    let missing = registry
        .invoke("delete_file", json!({ "file_name": "notes/todo.md" }))
        .await
        .unwrap_err();
    assert!(missing.to_string().contains("not found"));
}

#[tokio::test]
async fn test_update_requires_existing_file() {
    let dir = scratch();
    let files = FileActions::new(dir.path());

    let err = files.update("absent.txt", "x").await.unwrap_err();
    assert!(matches!(err, FileActionError::NotFound(_)));
    assert!(!dir.path().join("absent.txt").exists());
}

#[tokio::test]
async fn test_paths_cannot_escape_scratch_dir() {
    let dir = scratch();
    let registry = builtin_registry(&dir.path().join("inner"));

    for file_name in ["../escape.txt", "/etc/passwd", ""] {
        let err = registry
            .invoke(
                "create_file",
                json!({ "file_name": file_name, "content": "nope" }),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid path"), "{file_name}: {err}");
    }
    assert!(!dir.path().join("escape.txt").exists());
}

#[tokio::test]
async fn test_missing_arguments_never_reach_handler() {
    let dir = scratch();
    let registry = builtin_registry(dir.path());

    let err = registry
        .invoke("create_file", json!({ "file_name": "a.txt" }))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::SchemaViolation { .. }));
    assert!(!dir.path().join("a.txt").exists());
}

#[tokio::test]
async fn test_calendar_schedule_and_cancel() {
    let dir = scratch();
    let registry = builtin_registry(dir.path());

    let scheduled = registry
        .invoke(
            "create_calendar_event",
            json!({ "title": "Standup", "date": "2030-01-15", "time": "09:30", "duration_minutes": 15 }),
        )
        .await
        .unwrap();
    assert_eq!(scheduled["status"], "scheduled");
    assert!(dir.path().join("calendar.json").exists());

    let not_found = registry
        .invoke(
            "cancel_calendar_event",
            json!({ "title": "standup", "date": "2030-01-16" }),
        )
        .await
        .unwrap();
    assert_eq!(not_found["status"], "not_found");

    let cancelled = registry
        .invoke(
            "cancel_calendar_event",
            json!({ "title": "standup", "date": "2030-01-15", "time": "09:30" }),
        )
        .await
        .unwrap();
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["count"], 1);
}

#[tokio::test]
async fn test_calendar_rejects_bad_input() {
    let dir = scratch();
    let registry = builtin_registry(dir.path());

    let too_long = registry
        .invoke(
            "create_calendar_event",
            json!({ "title": "Offsite", "time": "09:00", "duration_minutes": 600 }),
        )
        .await
        .unwrap_err();
    assert_eq!(too_long.kind(), "schema_violation");

    let bad_time = registry
        .invoke(
            "create_calendar_event",
            json!({ "title": "Offsite", "time": "nine" }),
        )
        .await
        .unwrap_err();
    assert_eq!(bad_time.kind(), "handler_failure");

    registry
        .invoke(
            "create_calendar_event",
            json!({ "title": "Review", "date": "2030-01-15", "time": "14:00" }),
        )
        .await
        .unwrap();
    let blank = registry
        .invoke(
            "cancel_calendar_event",
            json!({ "title": " ", "date": "2030-01-15" }),
        )
        .await
        .unwrap_err();
    assert_eq!(blank.kind(), "handler_failure");
    assert!(blank.to_string().contains("title must not be empty"));

    let kept = registry
        .invoke(
            "cancel_calendar_event",
            json!({ "title": "review", "date": "2030-01-15" }),
        )
        .await
        .unwrap();
    assert_eq!(kept["count"], 1);
}

#[test]
fn test_current_time_shape() {
    let dir = scratch();
    let registry = builtin_registry(dir.path());

    let now = tokio_test::block_on(registry.invoke_raw("get_current_time", "")).unwrap();
    assert!(now["iso"].is_string());
    assert_eq!(now["date"].as_str().unwrap().len(), 10);
    assert_eq!(now["time"].as_str().unwrap().len(), 5);
}

#[test]
fn test_browser_rejects_non_web_urls() {
    let dir = scratch();
    let registry = builtin_registry(dir.path());

    let err = tokio_test::block_on(
        registry.invoke("open_browser", json!({ "url": "file:///etc/passwd" })),
    )
    .unwrap_err();
    assert_eq!(err.kind(), "handler_failure");
    assert!(err.to_string().contains("unsupported url scheme"));
}

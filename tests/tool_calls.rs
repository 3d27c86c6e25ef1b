//! End-to-end tests for the call wrapper, scheduler, dependency waits and
//! sandbox working together.

use acton_toolcall::prelude::*;
use acton_toolcall::testing::{
    module_returning, EventLog, RecordingBlobStore, RecordingTaskStore, StoreEvent, StubBehavior,
    StubTool,
};
use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn builtins() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    BuiltinTools::register_all(&mut registry)?;
    Ok(registry)
}

#[tokio::test(start_paused = true)]
async fn scheduled_size_tool_completes_after_delay() -> Result<()> {
    let log = EventLog::new();
    let tasks = Arc::new(RecordingTaskStore::new(log.clone()));
    let blobs = Arc::new(RecordingBlobStore::new(log.clone()));
    let behavior = StubBehavior::succeeding();

    let mut registry = ToolRegistry::new();
    let stub = behavior.clone();
    registry.register(StubTool::definition("sizeTool"), move |ctx| {
        Box::new(StubTool::new("sizeTool", ctx, stub.clone()))
    })?;

    let wrapper = ToolCallWrapper::new(
        registry,
        ToolServices::new(tasks.clone(), blobs),
        SchedulerConfig::default(),
    );

    let result = wrapper
        .wrap(
            "T",
            "C",
            "sizeTool",
            json!({"query": "q"}),
            ExecutionMode::Schedule,
            Some(Duration::from_millis(1000)),
        )
        .await;

    assert_eq!(
        serde_json::to_value(&result)?,
        json!({
            "status": "success",
            "tool_name": "sizeTool",
            "tool_call_id": "C",
            "thread_id": "T",
            "content": {"handle_name": "CsizeTool"}
        })
    );

    let task_id = tasks.list_thread_tasks("T").await?[0].id.clone();
    assert_eq!(log.status_updates(&task_id, TaskStatus::Completed), 0);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    wrapper.scheduler().idle().await;

    assert_eq!(behavior.execution_count(), 1);
    assert_eq!(log.status_updates(&task_id, TaskStatus::Completed), 1);

    let put = log.position(|e| matches!(e, StoreEvent::BlobPut(key) if key == "CsizeTool"));
    let completed = log.position(
        |e| matches!(e, StoreEvent::UpdateStatus(id, TaskStatus::Completed) if *id == task_id),
    );
    assert!(put.is_some() && put < completed);
    Ok(())
}

#[tokio::test]
async fn run_code_round_trip() -> Result<()> {
    let wrapper = ToolCallWrapper::new(builtins()?, ToolServices::in_memory(), SchedulerConfig::default());

    let result = wrapper
        .wrap(
            "thread",
            "call",
            "run_code",
            json!({"code": module_returning(r#"{"message":"Hello World"}"#)}),
            ExecutionMode::Sync,
            None,
        )
        .await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(
        result.content().map(|c| &c["output"]),
        Some(&json!({"message": "Hello World"}))
    );
    Ok(())
}

#[tokio::test]
async fn run_code_with_disallowed_module_fails_cleanly() -> Result<()> {
    let sandbox = SandboxExecutor::new(SandboxConfig::new().with_allowed_modules(["math"]));
    let services = ToolServices::in_memory().with_sandbox(sandbox);
    let wrapper = ToolCallWrapper::new(builtins()?, services, SchedulerConfig::default());

    let result = wrapper
        .wrap(
            "thread",
            "call",
            "run_code",
            json!({"code": r#"(module
                (import "timers" "defer" (func $defer (param i64)))
                (memory (export "memory") 1)
                (func (export "run") (result i32 i32) i32.const 0 i32.const 0))"#}),
            ExecutionMode::Sync,
            None,
        )
        .await;

    assert_eq!(result.error_type(), Some("ModuleNotAvailable"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn gather_outputs_waits_for_scheduled_code() -> Result<()> {
    let services = ToolServices::in_memory();
    let wrapper = ToolCallWrapper::new(builtins()?, services.clone(), SchedulerConfig::default());

    for (call, output) in [("a", "42"), ("b", r#""done""#)] {
        let code = module_returning(output);
        let scheduled = wrapper
            .wrap(
                "thread",
                call,
                "run_code",
                json!({ "code": code }),
                ExecutionMode::Schedule,
                Some(Duration::from_secs(5)),
            )
            .await;
        assert!(scheduled.is_success(), "{scheduled:?}");
    }

    let ids: Vec<String> = services
        .task_store
        .list_thread_tasks("thread")
        .await?
        .iter()
        .map(|task| task.id.to_string())
        .collect();
    assert_eq!(ids.len(), 2);

    let gathered = wrapper
        .wrap(
            "thread",
            "gather",
            "gather_outputs",
            json!({ "task_ids": ids }),
            ExecutionMode::Sync,
            None,
        )
        .await;

    assert_eq!(
        gathered.content(),
        Some(&json!({
            "outputs": {
                "arun_code": {"output": 42},
                "brun_code": {"output": "done"}
            }
        }))
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn gather_outputs_reports_failed_dependency() -> Result<()> {
    let services = ToolServices::in_memory();
    let wrapper = ToolCallWrapper::new(builtins()?, services.clone(), SchedulerConfig::default());

    let scheduled = wrapper
        .wrap(
            "thread",
            "bad",
            "run_code",
            json!({"code": r#"(module
                (memory (export "memory") 1)
                (func (export "run") (result i32 i32) unreachable))"#}),
            ExecutionMode::Schedule,
            None,
        )
        .await;
    assert!(scheduled.is_success(), "{scheduled:?}");

    let id = services.task_store.list_thread_tasks("thread").await?[0]
        .id
        .to_string();
    let gathered = wrapper
        .wrap(
            "thread",
            "gather",
            "gather_outputs",
            json!({ "task_ids": [id] }),
            ExecutionMode::Sync,
            None,
        )
        .await;

    assert_eq!(gathered.error_type(), Some("DependencyFailed"));
    Ok(())
}

#[tokio::test]
async fn libsql_backend_persists_scheduled_results() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let db_path = dir.path().join("tasks.db");
    let toml = format!(
        "[scheduler]\ndefault_delay_ms = 5\n\n[persistence]\nbackend = \"libsql\"\ndb_path = {:?}\n",
        db_path.to_string_lossy()
    );
    let config = acton_toolcall::config::from_str(&toml)?;
    let services = config.services().await?;
    let wrapper = ToolCallWrapper::new(
        builtins()?,
        services.clone(),
        config.scheduler.to_scheduler_config(),
    );

    let result = wrapper
        .wrap(
            "thread",
            "call",
            "run_code",
            json!({"code": module_returning("[1,2,3]")}),
            ExecutionMode::Schedule,
            None,
        )
        .await;
    assert!(result.is_success(), "{result:?}");
    wrapper.scheduler().idle().await;

    let reopened = LibSqlStore::open(db_path.to_string_lossy()).await?;
    let tasks = reopened.list_thread_tasks("thread").await?;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Completed);
    assert_eq!(tasks[0].result_blob_path.as_deref(), Some("callrun_code"));
    assert_eq!(
        reopened.try_get("callrun_code").await?,
        Some(json!({"output": [1, 2, 3]}))
    );
    Ok(())
}

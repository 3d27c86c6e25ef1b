//! Wait for other tasks and collect their outputs.

use crate::error::ToolCallError;
use crate::tools::{Tool, ToolContext, ToolDefinition, ToolExecutionFuture, ToolServices, ToolSpec};
use crate::types::TaskId;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Waits until every listed task has completed and returns
/// `{"outputs": {handle: payload}}`.
#[derive(Debug, Clone)]
pub struct GatherOutputsTool {
    args: Value,
    services: ToolServices,
}

/// Arguments for the gather_outputs tool.
#[derive(Debug, Deserialize)]
struct GatherOutputsArgs {
    /// Dependency task ids, in order
    task_ids: Vec<String>,
}

impl GatherOutputsTool {
    fn task_ids(&self) -> Result<Vec<TaskId>, ToolCallError> {
        let args: GatherOutputsArgs = serde_json::from_value(self.args.clone())
            .map_err(|e| ToolCallError::validation(Self::NAME, format!("invalid arguments: {e}")))?;

        TaskId::parse_all(&args.task_ids).map_err(|(raw, e)| {
            ToolCallError::validation(Self::NAME, format!("invalid task id '{raw}': {e}"))
        })
    }
}

impl ToolSpec for GatherOutputsTool {
    const NAME: &'static str = "gather_outputs";

    fn definition() -> ToolDefinition {
        ToolDefinition::new(
            Self::NAME,
            "Wait until the given scheduled tasks complete and return their outputs keyed by handle. Fails if any task failed.",
            json!({
                "type": "object",
                "properties": {
                    "task_ids": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Ids of the tasks to wait for (e.g. task_01h455vb4pex5vsknk084sn02q)"
                    }
                },
                "required": ["task_ids"]
            }),
        )
    }

    fn from_context(ctx: ToolContext) -> Self {
        Self {
            args: ctx.args,
            services: ctx.services,
        }
    }
}

impl Tool for GatherOutputsTool {
    fn describe(&self) -> ToolDefinition {
        Self::definition()
    }

    fn validate(&self) -> Result<(), ToolCallError> {
        self.task_ids().map(|_| ())
    }

    fn execute(&self) -> ToolExecutionFuture {
        let ids = self.task_ids();
        let mut waiter = self.services.dependency_waiter();
        Box::pin(async move {
            let ids = ids?;
            let outputs = waiter.wait_for(&ids).await?;
            let outputs: Map<String, Value> = outputs
                .into_iter()
                .map(|(handle, payload)| (handle.as_str().to_string(), payload))
                .collect();
            Ok(json!({ "outputs": outputs }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{BlobStore, NewTask, TaskStatus, TaskStore};
    use crate::types::TaskHandle;

    fn tool(args: Value, services: ToolServices) -> GatherOutputsTool {
        GatherOutputsTool::from_context(ToolContext::new("thread", "call", args, services))
    }

    #[test]
    fn rejects_malformed_ids() {
        let err = tool(json!({"task_ids": ["nope"]}), ToolServices::in_memory())
            .validate()
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("'nope'"));

        let err = tool(json!({}), ToolServices::in_memory()).validate().unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn empty_list_returns_no_outputs() {
        let result = tool(json!({"task_ids": []}), ToolServices::in_memory())
            .execute()
            .await
            .unwrap();
        assert_eq!(result, json!({"outputs": {}}));
    }

    #[tokio::test]
    async fn collects_completed_outputs() {
        let services = ToolServices::in_memory();
        let handle = TaskHandle::derive("call-1", "sizeTool");
        let task = services
            .task_store
            .create_task(NewTask {
                owner_thread_id: "thread".into(),
                tool_call_id: "call-1".into(),
                tool_name: "sizeTool".into(),
                args: json!({}),
                handle: handle.clone(),
            })
            .await
            .unwrap();
        services.blob_store.put(handle.as_str(), json!({"size": 1})).await.unwrap();
        for status in [TaskStatus::Running, TaskStatus::Completed] {
            services.task_store.update_task_status(&task.id, status).await.unwrap();
        }

        let result = tool(json!({"task_ids": [task.id.to_string()]}), services)
            .execute()
            .await
            .unwrap();
        assert_eq!(result, json!({"outputs": {"call-1sizeTool": {"size": 1}}}));
    }
}

//! Tool-call surface
//!
//! Every store operation is reachable as a named tool taking a JSON object of
//! arguments. Successful calls answer with `{"success": true, ...}` bodies;
//! failures answer with `{"success": false, "error": ..., "kind": ...}` and
//! never panic.

use crate::error::{ErrorKind, Result, StoreError};
use crate::types::{
    CreateMemoryInput, CreateTaskInput, DecayAction, MemoryType, Priority, RetrieveQuery,
    StatusFilter, TaskStatus,
};
use crate::Assistant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A tool as advertised to callers
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A named invocation with its arguments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of a tool call
#[derive(Debug, Clone)]
pub struct ToolResponse {
    /// JSON body returned to the caller
    pub body: Value,
    /// Set on failure
    pub error_kind: Option<ErrorKind>,
}

impl ToolResponse {
    fn success(body: Value) -> Self {
        Self {
            body,
            error_kind: None,
        }
    }

    fn failure(error: &StoreError) -> Self {
        let kind = error.kind();
        Self {
            body: json!({
                "success": false,
                "error": error.to_string(),
                "kind": kind,
            }),
            error_kind: Some(kind),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_kind.is_some()
    }
}

/// The tool catalogue
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "create_task",
            description: "Create a new task in the queue",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "description": { "type": "string", "description": "Task description" },
                    "priority": {
                        "type": "string",
                        "enum": ["critical", "high", "medium", "low"],
                    },
                    "category": { "type": "string", "description": "Task category" },
                    "due_date": { "type": "string", "description": "Due date (ISO 8601)" },
                    "dependencies": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Ids of tasks that must complete first",
                    },
                },
                "required": ["description", "priority", "category"],
            }),
        },
        ToolDefinition {
            name: "get_next_task",
            description: "Get the highest priority task whose dependencies are complete",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "category": { "type": "string", "description": "Only consider this category" },
                },
            }),
        },
        ToolDefinition {
            name: "update_task_status",
            description: "Update the status of a task",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string" },
                    "status": {
                        "type": "string",
                        "enum": ["pending", "in_progress", "completed", "failed"],
                    },
                    "result": { "type": "string", "description": "Outcome or error text" },
                },
                "required": ["id", "status"],
            }),
        },
        ToolDefinition {
            name: "list_tasks",
            description: "List tasks with optional filters",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "status": {
                        "type": "string",
                        "enum": ["pending", "in_progress", "completed", "failed", "all"],
                    },
                    "category": { "type": "string" },
                },
            }),
        },
        ToolDefinition {
            name: "delete_task",
            description: "Delete a task from the queue",
            input_schema: json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"],
            }),
        },
        ToolDefinition {
            name: "store_memory",
            description: "Store a new memory",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "type": {
                        "type": "string",
                        "enum": ["preference", "skill", "pattern", "decision", "fact", "interaction"],
                    },
                    "category": { "type": "string" },
                    "content": { "type": "string" },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "importance": { "type": "number", "minimum": 1, "maximum": 10 },
                },
                "required": ["type", "category", "content"],
            }),
        },
        ToolDefinition {
            name: "retrieve_memory",
            description: "Retrieve memories ranked by decay score",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Case-insensitive text match" },
                    "category": { "type": "string" },
                    "type": { "type": "string" },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "limit": { "type": "number", "default": 10 },
                    "min_decay_score": { "type": "number" },
                },
            }),
        },
        ToolDefinition {
            name: "merge_memories",
            description: "Merge several memories into one",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "memory_ids": { "type": "array", "items": { "type": "string" } },
                    "merged_content": { "type": "string" },
                },
                "required": ["memory_ids", "merged_content"],
            }),
        },
        ToolDefinition {
            name: "decay_old_memories",
            description: "Rescore memories and archive or delete those below a threshold",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "min_decay_score": { "type": "number", "default": 0.01 },
                    "action": { "type": "string", "enum": ["archive", "delete"], "default": "archive" },
                },
            }),
        },
        ToolDefinition {
            name: "list_categories",
            description: "List all memory categories",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDefinition {
            name: "update_memory_access",
            description: "Record an access to a memory and refresh its score",
            input_schema: json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"],
            }),
        },
    ]
}

#[derive(Deserialize)]
struct CreateTaskArgs {
    description: String,
    priority: Priority,
    category: String,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Deserialize)]
struct CategoryArgs {
    #[serde(default)]
    category: Option<String>,
}

#[derive(Deserialize)]
struct UpdateStatusArgs {
    id: String,
    status: TaskStatus,
    #[serde(default)]
    result: Option<String>,
}

#[derive(Deserialize)]
struct ListTasksArgs {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Deserialize)]
struct IdArgs {
    id: String,
}

#[derive(Deserialize)]
struct StoreMemoryArgs {
    #[serde(rename = "type")]
    memory_type: MemoryType,
    category: String,
    content: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    importance: Option<u8>,
}

#[derive(Deserialize)]
struct RetrieveArgs {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, rename = "type")]
    memory_type: Option<MemoryType>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    min_decay_score: Option<f64>,
}

#[derive(Deserialize)]
struct MergeArgs {
    memory_ids: Vec<String>,
    merged_content: String,
}

#[derive(Deserialize)]
struct DecayArgs {
    #[serde(default)]
    min_decay_score: Option<f64>,
    #[serde(default)]
    action: Option<DecayAction>,
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments)
        .map_err(|e| StoreError::InvalidArgument(format!("bad arguments for {}: {}", tool, e)))
}

/// Run one tool call against the assistant
pub async fn dispatch(assistant: &Assistant, call: ToolCall) -> ToolResponse {
    tracing::debug!("Tool call {}", call.name);

    match run(assistant, &call.name, call.arguments).await {
        Ok(body) => ToolResponse::success(body),
        Err(e) => {
            tracing::warn!("Tool {} failed: {}", call.name, e);
            ToolResponse::failure(&e)
        }
    }
}

async fn run(assistant: &Assistant, name: &str, arguments: Value) -> Result<Value> {
    let tasks = assistant.tasks();
    let memories = assistant.memories();

    let body = match name {
        "create_task" => {
            let args: CreateTaskArgs = parse_args(name, arguments)?;
            let mut input = CreateTaskInput::new(args.description, args.priority, args.category)
                .with_dependencies(args.dependencies);
            if let Some(due_date) = args.due_date {
                input = input.with_due_date(due_date);
            }
            let task = tasks.create_task(input).await?;
            json!({ "success": true, "task": task })
        }
        "get_next_task" => {
            let args: CategoryArgs = parse_args(name, arguments)?;
            let task = tasks.get_next_task(args.category.as_deref()).await?;
            json!({ "success": true, "task": task })
        }
        "update_task_status" => {
            let args: UpdateStatusArgs = parse_args(name, arguments)?;
            let task = tasks
                .update_task_status(&args.id, args.status, args.result)
                .await?;
            json!({ "success": true, "task": task })
        }
        "list_tasks" => {
            let args: ListTasksArgs = parse_args(name, arguments)?;
            let filter: StatusFilter = match args.status {
                Some(status) => status.parse()?,
                None => StatusFilter::All,
            };
            let listed = tasks.list_tasks(filter, args.category.as_deref()).await?;
            json!({ "success": true, "count": listed.len(), "tasks": listed })
        }
        "delete_task" => {
            let args: IdArgs = parse_args(name, arguments)?;
            let task = tasks.delete_task(&args.id).await?;
            json!({ "success": true, "task": task })
        }
        "store_memory" => {
            let args: StoreMemoryArgs = parse_args(name, arguments)?;
            let mut input = CreateMemoryInput::new(args.memory_type, args.category, args.content)
                .with_tags(args.tags);
            input.importance = args.importance;
            let memory = memories.store_memory(input).await?;
            json!({ "success": true, "memory": memory })
        }
        "retrieve_memory" => {
            let args: RetrieveArgs = parse_args(name, arguments)?;
            let query = RetrieveQuery {
                query: args.query,
                category: args.category,
                memory_type: args.memory_type,
                tags: args.tags,
                min_decay_score: args.min_decay_score,
                limit: args.limit,
            };
            let found = memories.retrieve_memory(&query).await?;
            json!({ "success": true, "count": found.len(), "memories": found })
        }
        "merge_memories" => {
            let args: MergeArgs = parse_args(name, arguments)?;
            let memory = memories
                .merge_memories(&args.memory_ids, &args.merged_content)
                .await?;
            json!({ "success": true, "memory": memory })
        }
        "decay_old_memories" => {
            let args: DecayArgs = parse_args(name, arguments)?;
            let report = memories
                .decay_old_memories(args.min_decay_score, args.action)
                .await?;
            json!({
                "success": true,
                "processed": report.processed_count,
                "action": report.action,
                "archive": report.archive,
            })
        }
        "list_categories" => {
            let categories = memories.list_categories().await?;
            json!({ "success": true, "categories": categories })
        }
        "update_memory_access" => {
            let args: IdArgs = parse_args(name, arguments)?;
            let memory = memories.update_memory_access(&args.id).await?;
            json!({ "success": true, "memory": memory })
        }
        other => {
            return Err(StoreError::InvalidArgument(format!("Unknown tool: {}", other)));
        }
    };

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    async fn call(assistant: &Assistant, name: &str, arguments: Value) -> ToolResponse {
        dispatch(assistant, ToolCall::new(name, arguments)).await
    }

    #[test]
    fn test_catalogue_names_are_unique() {
        let definitions = tool_definitions();
        let names: HashSet<_> = definitions.iter().map(|d| d.name).collect();
        assert_eq!(definitions.len(), 11);
        assert_eq!(names.len(), 11);
        assert!(definitions
            .iter()
            .all(|d| d.input_schema["type"] == "object"));
    }

    #[tokio::test]
    async fn test_task_round_trip_through_tools() {
        let assistant = Assistant::in_memory();

        let created = call(
            &assistant,
            "create_task",
            json!({
                "description": "Write tests",
                "priority": "high",
                "category": "dev",
                "due_date": "2025-02-01",
            }),
        )
        .await;
        assert!(!created.is_error());
        assert_eq!(created.body["task"]["due_date"], "2025-02-01");
        let id = created.body["task"]["id"].as_str().unwrap().to_string();
        assert_eq!(created.body["task"]["status"], "pending");

        let next = call(&assistant, "get_next_task", json!({})).await;
        assert_eq!(next.body["task"]["id"], id.as_str());

        let done = call(
            &assistant,
            "update_task_status",
            json!({ "id": id, "status": "completed", "result": "ok" }),
        )
        .await;
        assert_eq!(done.body["task"]["result"], "ok");
        assert!(done.body["task"]["completed_at"].is_string());

        let none = call(&assistant, "get_next_task", Value::Null).await;
        assert!(none.body["task"].is_null());
        assert_eq!(none.body["success"], true);

        let listed = call(&assistant, "list_tasks", json!({ "status": "completed" })).await;
        assert_eq!(listed.body["count"], 1);
    }

    #[tokio::test]
    async fn test_missing_task_reports_not_found() {
        let assistant = Assistant::in_memory();
        let response = call(&assistant, "delete_task", json!({ "id": "task-0-missing" })).await;

        assert_eq!(response.error_kind, Some(ErrorKind::NotFound));
        assert_eq!(response.body["success"], false);
        assert_eq!(response.body["kind"], "not_found");
        assert!(response.body["error"]
            .as_str()
            .unwrap()
            .contains("task-0-missing"));
    }

    #[tokio::test]
    async fn test_bad_arguments_and_unknown_tools_are_invalid() {
        let assistant = Assistant::in_memory();

        let bad_priority = call(
            &assistant,
            "create_task",
            json!({ "description": "x", "priority": "urgent", "category": "y" }),
        )
        .await;
        assert_eq!(bad_priority.error_kind, Some(ErrorKind::InvalidArgument));

        let bad_filter = call(&assistant, "list_tasks", json!({ "status": "done" })).await;
        assert_eq!(bad_filter.error_kind, Some(ErrorKind::InvalidArgument));

        let unknown = call(&assistant, "launch_rocket", json!({})).await;
        assert_eq!(unknown.error_kind, Some(ErrorKind::InvalidArgument));
        assert_eq!(unknown.body["kind"], "invalid_argument");
    }

    #[tokio::test]
    async fn test_memory_tools() {
        let assistant = Assistant::in_memory();

        let mut ids = Vec::new();
        for (content, tags) in [("Uses vim", json!(["editor"])), ("Uses tmux", json!(["shell"]))] {
            let stored = call(
                &assistant,
                "store_memory",
                json!({ "type": "preference", "category": "tools", "content": content, "tags": tags }),
            )
            .await;
            assert_eq!(stored.body["memory"]["decay_score"], "1.0000");
            ids.push(stored.body["memory"]["id"].as_str().unwrap().to_string());
        }

        let found = call(&assistant, "retrieve_memory", json!({ "query": "VIM" })).await;
        assert_eq!(found.body["count"], 1);

        let touched = call(&assistant, "update_memory_access", json!({ "id": ids[0] })).await;
        assert_eq!(touched.body["memory"]["access_count"], 1);

        let merged = call(
            &assistant,
            "merge_memories",
            json!({ "memory_ids": ids, "merged_content": "Terminal user" }),
        )
        .await;
        assert!(!merged.is_error());
        assert_eq!(merged.body["memory"]["related_ids"].as_array().unwrap().len(), 2);

        let categories = call(&assistant, "list_categories", json!({})).await;
        assert_eq!(categories.body["categories"], json!(["tools"]));

        let decayed = call(
            &assistant,
            "decay_old_memories",
            json!({ "min_decay_score": 0.01, "action": "delete" }),
        )
        .await;
        assert_eq!(decayed.body["action"], "delete");
        assert_eq!(decayed.body["processed"], 0);
    }

    #[tokio::test]
    async fn test_merge_with_one_id_is_invalid() {
        let assistant = Assistant::in_memory();
        let response = call(
            &assistant,
            "merge_memories",
            json!({ "memory_ids": ["mem-a"], "merged_content": "x" }),
        )
        .await;
        assert_eq!(response.error_kind, Some(ErrorKind::InvalidArgument));
    }
}

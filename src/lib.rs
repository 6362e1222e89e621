//! # mindqueue - task queue and decaying memory store for agents
//!
//! Two JSON-backed collections sit behind one [`Assistant`]:
//!
//! - a **task queue** whose next-task selection honours priority, age and
//!   completed dependencies ([`TaskStore`]);
//! - a **memory store** whose entries are ranked by a recency/frequency
//!   decay score and swept when they fall below a threshold ([`MemoryStore`]).
//!
//! Both are reachable as named tool calls through [`tools::dispatch`].
//!
//! ```no_run
//! use mindqueue::{Assistant, CreateTaskInput, Priority};
//!
//! # async fn demo() -> mindqueue::Result<()> {
//! let assistant = Assistant::with_data_dir("./mindqueue_data")?;
//! assistant
//!     .tasks()
//!     .create_task(CreateTaskInput::new("Write report", Priority::High, "docs"))
//!     .await?;
//! let next = assistant.tasks().get_next_task(None).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decay;
pub mod error;
pub mod maintenance;
pub mod memory_store;
pub mod stats;
pub mod storage_backend;
pub mod task_store;
pub mod tools;
pub mod types;

pub use config::{StoreConfig, StoreConfigBuilder, TransitionPolicy};
pub use decay::{days_between, score_on_access, score_on_sweep, DecayScore};
pub use error::{ErrorKind, Result, StoreError};
pub use maintenance::{
    run_maintenance, MaintenanceConfig, MaintenanceConfigBuilder, MaintenanceReport,
};
pub use memory_store::{
    filter_memories, rank_memories, DecayReport, MemoryStore, RescoreReport,
    DEFAULT_DECAY_THRESHOLD,
};
pub use stats::{MemoryStats, SystemStats, TaskStats};
pub use storage_backend::{DocumentBackend, InMemoryBackend, JsonFileBackend};
pub use task_store::{select_next, sort_for_listing, PurgeReport, TaskStore};
pub use tools::{dispatch, tool_definitions, ToolCall, ToolDefinition, ToolResponse};
pub use types::{
    CreateMemoryInput, CreateTaskInput, DecayAction, Memory, MemoryId, MemoryIndex, MemoryType,
    Priority, RetrieveQuery, StatusFilter, Task, TaskDocument, TaskId, TaskStatus,
    DEFAULT_IMPORTANCE,
};

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The task queue and memory store side by side
pub struct Assistant {
    tasks: TaskStore,
    memories: MemoryStore,
    data_dir: Option<PathBuf>,
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("tasks", &self.tasks)
            .field("memories", &self.memories)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

impl Assistant {
    /// Open both collections as JSON files laid out by `config`
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let tasks = TaskStore::new(Arc::new(JsonFileBackend::new(config.tasks_path())))
            .with_policy(config.transition_policy);
        let memories = MemoryStore::new(Arc::new(JsonFileBackend::new(
            config.memory_index_path(),
        )));

        tracing::debug!("Opened stores under {}", config.data_dir.display());
        Ok(Self {
            tasks,
            memories,
            data_dir: Some(config.data_dir),
        })
    }

    /// Open with the default layout under `data_dir`
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(
            StoreConfig::builder()
                .data_dir(data_dir.as_ref())
                .build()?,
        )
    }

    /// Process-local stores, nothing touches disk
    pub fn in_memory() -> Self {
        Self::from_stores(
            TaskStore::new(Arc::new(InMemoryBackend::new())),
            MemoryStore::new(Arc::new(InMemoryBackend::new())),
        )
    }

    pub fn from_stores(tasks: TaskStore, memories: MemoryStore) -> Self {
        Self {
            tasks,
            memories,
            data_dir: None,
        }
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn memories(&self) -> &MemoryStore {
        &self.memories
    }

    /// Root directory, if file backed
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Snapshot of both collections
    pub async fn stats(&self) -> Result<SystemStats> {
        Ok(SystemStats {
            tasks: self.tasks.stats().await?,
            memories: self.memories.stats().await?,
            generated_at: Utc::now(),
        })
    }

    /// Run maintenance tasks
    pub async fn run_maintenance(&self, config: &MaintenanceConfig) -> Result<MaintenanceReport> {
        maintenance::run_maintenance(&self.tasks, &self.memories, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reopened_assistant_sees_prior_writes() {
        let dir = tempfile::tempdir().unwrap();

        let first = Assistant::with_data_dir(dir.path()).unwrap();
        assert_eq!(first.data_dir(), Some(dir.path()));
        let task = first
            .tasks()
            .create_task(CreateTaskInput::new("persist me", Priority::Medium, "io"))
            .await
            .unwrap();
        first
            .memories()
            .store_memory(CreateMemoryInput::new(MemoryType::Fact, "io", "disk"))
            .await
            .unwrap();

        assert!(dir.path().join("tasks.json").exists());
        assert!(dir.path().join("memory").join("index.json").exists());

        let second = Assistant::with_data_dir(dir.path()).unwrap();
        assert_eq!(second.tasks().get_task(&task.id).await.unwrap(), task);
        assert_eq!(
            second.memories().list_categories().await.unwrap(),
            vec!["io".to_string()]
        );
    }

    #[tokio::test]
    async fn test_corrupt_documents_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tasks.json"), "{not json").unwrap();

        let assistant = Assistant::with_data_dir(dir.path()).unwrap();
        let tasks = assistant
            .tasks()
            .list_tasks(StatusFilter::All, None)
            .await
            .unwrap();
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_persisted_decay_score_is_a_four_decimal_string() {
        let dir = tempfile::tempdir().unwrap();
        let assistant = Assistant::with_data_dir(dir.path()).unwrap();
        assistant
            .memories()
            .store_memory(CreateMemoryInput::new(MemoryType::Skill, "rust", "ownership"))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(dir.path().join("memory").join("index.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["memories"][0]["decay_score"], "1.0000");
        assert_eq!(value["memories"][0]["type"], "skill");
        assert_eq!(value["lastId"], 1);
    }

    #[tokio::test]
    async fn test_stats_cover_both_collections() {
        let assistant = Assistant::in_memory();
        assert!(assistant.data_dir().is_none());
        assistant
            .tasks()
            .create_task(CreateTaskInput::new("a", Priority::Low, "x"))
            .await
            .unwrap();

        let stats = assistant.stats().await.unwrap();
        assert_eq!(stats.tasks.total, 1);
        assert_eq!(stats.tasks.pending, 1);
        assert_eq!(stats.memories.total, 0);
    }
}

//! Task queue with dependency-aware selection
//!
//! The whole task document is loaded, changed and written back on every
//! call. A per-store mutex serializes those cycles inside one process.

use crate::config::TransitionPolicy;
use crate::error::{Result, StoreError};
use crate::stats::TaskStats;
use crate::storage_backend::{load_document, save_document, DocumentBackend};
use crate::types::{CreateTaskInput, StatusFilter, Task, TaskDocument, TaskStatus};

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Pick the task to work on next.
///
/// Only pending tasks (optionally of one category) whose dependencies all
/// resolve to completed tasks are eligible. Candidates are ordered by
/// priority, then oldest first. Tasks held back by missing or unfinished
/// dependencies are skipped silently.
pub fn select_next<'a>(tasks: &'a [Task], category: Option<&str>) -> Option<&'a Task> {
    let status_by_id: HashMap<&str, TaskStatus> =
        tasks.iter().map(|t| (t.id.as_str(), t.status)).collect();

    let mut candidates: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.is_pending())
        .filter(|t| category.map_or(true, |c| t.category == c))
        .filter(|t| {
            t.dependencies
                .iter()
                .all(|dep| status_by_id.get(dep.as_str()) == Some(&TaskStatus::Completed))
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });

    candidates.into_iter().next()
}

/// Listing order: priority first, newest first within a priority
pub fn sort_for_listing(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

/// Outcome of purging old completed tasks
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PurgeReport {
    pub removed: usize,
    pub kept: usize,
}

/// Persistent task queue
pub struct TaskStore {
    backend: Arc<dyn DocumentBackend>,
    policy: TransitionPolicy,
    lock: Mutex<()>,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("backend", &self.backend.backend_name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl TaskStore {
    /// Create a task store over the given backend
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            backend,
            policy: TransitionPolicy::default(),
            lock: Mutex::new(()),
        }
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    async fn load(&self) -> Result<TaskDocument> {
        load_document(self.backend.as_ref()).await
    }

    async fn save(&self, document: &TaskDocument) -> Result<()> {
        save_document(self.backend.as_ref(), document).await
    }

    /// Append a new pending task.
    ///
    /// The id is minted here, so a new task can never list itself as a
    /// dependency. Dependency ids are not checked for existence.
    pub async fn create_task(&self, input: CreateTaskInput) -> Result<Task> {
        let mut task = Task::new(input.description, input.priority, input.category)
            .with_dependencies(input.dependencies);
        task.due_date = input.due_date;

        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;
        document.tasks.push(task.clone());
        document.last_id += 1;
        self.save(&document).await?;

        tracing::info!(
            "Created task {} ({}, {})",
            task.id,
            task.priority,
            task.category
        );
        Ok(task)
    }

    /// Best task to work on next, if any is eligible
    pub async fn get_next_task(&self, category: Option<&str>) -> Result<Option<Task>> {
        let _guard = self.lock.lock().await;
        let document = self.load().await?;
        Ok(select_next(&document.tasks, category).cloned())
    }

    /// Select the next task and mark it in progress in one cycle
    pub async fn claim_next(&self, category: Option<&str>) -> Result<Option<Task>> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;

        let Some(id) = select_next(&document.tasks, category).map(|t| t.id.clone()) else {
            tracing::debug!("No eligible task to claim");
            return Ok(None);
        };

        let task = document
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::task_not_found(&id))?;
        task.status = TaskStatus::InProgress;
        task.updated_at = Utc::now();
        let claimed = task.clone();

        self.save(&document).await?;
        tracing::info!("Claimed task {}", claimed.id);
        Ok(Some(claimed))
    }

    /// Set a task's status.
    ///
    /// Any status may follow any other under the default permissive policy.
    pub async fn update_task_status(
        &self,
        id: &str,
        status: TaskStatus,
        result: Option<String>,
    ) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;

        let task = document
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::task_not_found(id))?;

        if self.policy == TransitionPolicy::ForwardOnly && !task.status.can_transition_to(status)
        {
            return Err(StoreError::InvalidArgument(format!(
                "Task {} cannot move from {} to {}",
                id, task.status, status
            )));
        }

        let now = Utc::now();
        let previous = task.status;
        task.status = status;
        task.updated_at = now;
        if let Some(result) = result {
            task.result = Some(result);
        }
        if status == TaskStatus::Completed {
            task.completed_at = Some(now);
        }
        let updated = task.clone();

        self.save(&document).await?;
        tracing::info!("Task {} moved {} -> {}", id, previous, status);
        Ok(updated)
    }

    /// Tasks matching the filters, in listing order
    pub async fn list_tasks(
        &self,
        filter: StatusFilter,
        category: Option<&str>,
    ) -> Result<Vec<Task>> {
        let _guard = self.lock.lock().await;
        let document = self.load().await?;

        let mut tasks: Vec<Task> = document
            .tasks
            .into_iter()
            .filter(|t| filter.matches(t.status))
            .filter(|t| category.map_or(true, |c| t.category == c))
            .collect();
        sort_for_listing(&mut tasks);
        Ok(tasks)
    }

    /// Get a task by id
    pub async fn get_task(&self, id: &str) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let document = self.load().await?;
        document
            .tasks
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::task_not_found(id))
    }

    /// Remove a task and return it. Dependents keep their (now dangling) reference.
    pub async fn delete_task(&self, id: &str) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;

        let index = document
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StoreError::task_not_found(id))?;
        let removed = document.tasks.remove(index);

        self.save(&document).await?;
        tracing::info!("Deleted task {}", id);
        Ok(removed)
    }

    /// Drop completed tasks whose completion is older than `older_than`
    pub async fn purge_completed(&self, older_than: Duration) -> Result<PurgeReport> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;

        let cutoff = Utc::now() - older_than;
        let before = document.tasks.len();
        document.tasks.retain(|t| match (t.status, t.completed_at) {
            (TaskStatus::Completed, Some(done)) => done > cutoff,
            _ => true,
        });

        let report = PurgeReport {
            removed: before - document.tasks.len(),
            kept: document.tasks.len(),
        };

        if report.removed > 0 {
            self.save(&document).await?;
        }
        tracing::info!(
            "Purged {} completed tasks, kept {}",
            report.removed,
            report.kept
        );
        Ok(report)
    }

    /// Counts by status and priority
    pub async fn stats(&self) -> Result<TaskStats> {
        let _guard = self.lock.lock().await;
        let document = self.load().await?;
        Ok(TaskStats::from_tasks(&document.tasks))
    }
}

//! Task and memory types

use crate::decay::DecayScore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for tasks
pub type TaskId = String;

/// Unique identifier for memories
pub type MemoryId = String;

/// Importance assigned to a memory when the caller gives none
pub const DEFAULT_IMPORTANCE: u8 = 5;

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// A unit of work in the queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier, immutable
    pub id: TaskId,
    /// Free-text description of the work
    pub description: String,
    /// Scheduling priority
    pub priority: Priority,
    /// Classification tag, only used as a filter
    pub category: String,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Optional due date, kept as the caller wrote it (ISO 8601 date or date-time)
    #[serde(default)]
    pub due_date: Option<String>,
    /// Ids of tasks that must be completed before this one is eligible
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Stamped whenever the task is marked completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Outcome text recorded on status updates
    #[serde(default)]
    pub result: Option<String>,
}

impl Task {
    /// Create a pending task with a fresh id
    pub fn new(
        description: impl Into<String>,
        priority: Priority,
        category: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_task_id(now),
            description: description.into(),
            priority,
            category: category.into(),
            status: TaskStatus::Pending,
            due_date: None,
            dependencies: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            result: None,
        }
    }

    /// Set dependencies, dropping duplicates while keeping the given order
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.dependencies.clear();
        for dep in dependencies {
            let dep = dep.into();
            if !self.dependencies.contains(&dep) {
                self.dependencies.push(dep);
            }
        }
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

fn new_task_id(now: DateTime<Utc>) -> TaskId {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("task-{}-{}", now.timestamp_millis(), &suffix[..9])
}

/// Task priority. Ordering puts `Critical` first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: &[Priority] = &[
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Critical => write!(f, "critical"),
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = crate::StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(crate::StoreError::InvalidArgument(format!(
                "unknown priority '{}'",
                other
            ))),
        }
    }
}

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be picked up
    Pending,
    /// Picked up by a worker
    InProgress,
    /// Done successfully
    Completed,
    /// Execution failed
    Failed,
}

impl TaskStatus {
    pub const ALL: &[TaskStatus] = &[
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    /// Forward-only transitions, plus retrying a failed task.
    ///
    /// Only consulted under `TransitionPolicy::ForwardOnly`.
    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Pending, InProgress)
                | (Pending, Completed)
                | (Pending, Failed)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (Failed, Pending)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = crate::StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(crate::StoreError::InvalidArgument(format!(
                "unknown task status '{}'",
                other
            ))),
        }
    }
}

/// Status filter for listing tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(TaskStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: TaskStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = crate::StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            Ok(StatusFilter::All)
        } else {
            s.parse().map(StatusFilter::Only)
        }
    }
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct CreateTaskInput {
    pub description: String,
    pub priority: Priority,
    pub category: String,
    pub due_date: Option<String>,
    pub dependencies: Vec<TaskId>,
}

impl CreateTaskInput {
    pub fn new(
        description: impl Into<String>,
        priority: Priority,
        category: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            priority,
            category: category.into(),
            due_date: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn depends_on(mut self, id: impl Into<TaskId>) -> Self {
        self.dependencies.push(id.into());
        self
    }
}

/// Persisted task collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDocument {
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Running counter bumped on every create
    #[serde(default, rename = "lastId")]
    pub last_id: u64,
}

// ---------------------------------------------------------------------------
// Memories
// ---------------------------------------------------------------------------

/// A stored fact with access statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    /// Unique identifier
    pub id: MemoryId,
    /// Kind of knowledge held
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// Free-text grouping
    pub category: String,
    /// The memory content
    pub content: String,
    /// Tags used for filtering and matching
    #[serde(default)]
    pub tags: Vec<String>,
    /// Caller-supplied importance, 1-10
    pub importance: u8,
    pub created_at: DateTime<Utc>,
    /// Refreshed on access tracking and merge
    pub accessed_at: DateTime<Utc>,
    /// Number of tracked accesses
    #[serde(default)]
    pub access_count: u64,
    /// Cached recency/frequency score
    #[serde(default = "DecayScore::fresh")]
    pub decay_score: DecayScore,
    /// Ids of memories absorbed into this one
    #[serde(default)]
    pub related_ids: Vec<MemoryId>,
}

impl Memory {
    /// Create a new memory with default values
    pub fn new(
        memory_type: MemoryType,
        category: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_memory_id(),
            memory_type,
            category: category.into(),
            content: content.into(),
            tags: Vec::new(),
            importance: DEFAULT_IMPORTANCE,
            created_at: now,
            accessed_at: now,
            access_count: 0,
            decay_score: DecayScore::FRESH,
            related_ids: Vec::new(),
        }
    }

    /// Set tags, dropping duplicates
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.clear();
        for tag in tags {
            let tag = tag.into();
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self
    }

    pub fn with_importance(mut self, importance: u8) -> Self {
        self.importance = importance;
        self
    }

    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }

    /// Case-insensitive substring match over content, category and tags
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        self.content.to_lowercase().contains(needle_lower)
            || self.category.to_lowercase().contains(needle_lower)
            || self
                .tags
                .iter()
                .any(|t| t.to_lowercase().contains(needle_lower))
    }
}

pub(crate) fn new_memory_id() -> MemoryId {
    format!("mem-{}", Uuid::new_v4())
}

/// Types of memories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// User preference
    Preference,
    /// Learned capability
    Skill,
    /// Recurring observation
    Pattern,
    /// Decision that was made
    Decision,
    /// Objective fact
    Fact,
    /// Something said or done in a conversation
    Interaction,
}

impl MemoryType {
    pub const ALL: &[MemoryType] = &[
        MemoryType::Preference,
        MemoryType::Skill,
        MemoryType::Pattern,
        MemoryType::Decision,
        MemoryType::Fact,
        MemoryType::Interaction,
    ];
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryType::Preference => write!(f, "preference"),
            MemoryType::Skill => write!(f, "skill"),
            MemoryType::Pattern => write!(f, "pattern"),
            MemoryType::Decision => write!(f, "decision"),
            MemoryType::Fact => write!(f, "fact"),
            MemoryType::Interaction => write!(f, "interaction"),
        }
    }
}

impl std::str::FromStr for MemoryType {
    type Err = crate::StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MemoryType::ALL
            .iter()
            .copied()
            .find(|t| t.to_string() == s.to_lowercase())
            .ok_or_else(|| {
                crate::StoreError::InvalidArgument(format!("unknown memory type '{}'", s))
            })
    }
}

/// Input for storing a memory
#[derive(Debug, Clone)]
pub struct CreateMemoryInput {
    pub memory_type: MemoryType,
    pub category: String,
    pub content: String,
    pub tags: Vec<String>,
    pub importance: Option<u8>,
}

impl CreateMemoryInput {
    pub fn new(
        memory_type: MemoryType,
        category: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            memory_type,
            category: category.into(),
            content: content.into(),
            tags: Vec::new(),
            importance: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_importance(mut self, importance: u8) -> Self {
        self.importance = Some(importance);
        self
    }
}

/// Filters for memory retrieval
#[derive(Debug, Clone, Default)]
pub struct RetrieveQuery {
    /// Case-insensitive substring over content, category and tags
    pub query: Option<String>,
    pub category: Option<String>,
    pub memory_type: Option<MemoryType>,
    /// Matches when the memory shares at least one tag
    pub tags: Vec<String>,
    pub min_decay_score: Option<f64>,
    /// Defaults to `RetrieveQuery::DEFAULT_LIMIT`; zero also means default
    pub limit: Option<usize>,
}

impl RetrieveQuery {
    pub const DEFAULT_LIMIT: usize = 10;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn memory_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = Some(memory_type);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn min_decay_score(mut self, score: f64) -> Self {
        self.min_decay_score = Some(score);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn effective_limit(&self) -> usize {
        match self.limit {
            Some(0) | None => Self::DEFAULT_LIMIT,
            Some(n) => n,
        }
    }
}

/// What a decay sweep does with low-scoring memories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecayAction {
    /// Write them to a timestamped snapshot, then drop them
    #[default]
    Archive,
    /// Drop them without a snapshot
    Delete,
}

impl std::fmt::Display for DecayAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecayAction::Archive => write!(f, "archive"),
            DecayAction::Delete => write!(f, "delete"),
        }
    }
}

impl std::str::FromStr for DecayAction {
    type Err = crate::StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "archive" => Ok(DecayAction::Archive),
            "delete" => Ok(DecayAction::Delete),
            other => Err(crate::StoreError::InvalidArgument(format!(
                "unknown decay action '{}'",
                other
            ))),
        }
    }
}

/// Persisted memory collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryIndex {
    #[serde(default)]
    pub memories: Vec<Memory>,
    /// Distinct categories in first-seen order
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, rename = "lastId")]
    pub last_id: u64,
}

impl MemoryIndex {
    /// Register a category if it has not been seen
    pub fn register_category(&mut self, category: &str) -> bool {
        if self.categories.iter().any(|c| c == category) {
            false
        } else {
            self.categories.push(category.to_string());
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_critical_first() {
        let mut priorities = vec![Priority::Low, Priority::Critical, Priority::Medium, Priority::High];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::Critical, Priority::High, Priority::Medium, Priority::Low]
        );
    }

    #[test]
    fn task_ids_are_prefixed_and_unique() {
        let a = Task::new("a", Priority::Low, "misc");
        let b = Task::new("b", Priority::Low, "misc");
        assert!(a.id.starts_with("task-"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn dependencies_are_deduplicated() {
        let task = Task::new("a", Priority::Low, "misc").with_dependencies(["t1", "t2", "t1"]);
        assert_eq!(task.dependencies, vec!["t1".to_string(), "t2".to_string()]);
    }

    #[test]
    fn forward_only_allows_retry_but_not_reopen() {
        assert!(TaskStatus::Failed.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::InProgress.can_transition_to(TaskStatus::Pending));
    }

    #[test]
    fn status_filter_parses_all() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!(
            "in_progress".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(TaskStatus::InProgress)
        );
        assert!("done".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn memory_serializes_with_source_field_names() {
        let memory = Memory::new(MemoryType::Skill, "coding", "Knows Rust");
        let json = serde_json::to_value(&memory).unwrap();
        assert_eq!(json["type"], "skill");
        assert_eq!(json["decay_score"], "1.0000");
        assert_eq!(json["importance"], 5);
        assert!(memory.id.starts_with("mem-"));
    }

    #[test]
    fn text_match_is_case_insensitive_across_fields() {
        let memory = Memory::new(MemoryType::Fact, "Research", "Tokio is an async runtime")
            .with_tags(["Rust"]);
        assert!(memory.matches_text("tokio"));
        assert!(memory.matches_text("research"));
        assert!(memory.matches_text("rust"));
        assert!(!memory.matches_text("python"));
    }

    #[test]
    fn zero_limit_falls_back_to_default() {
        assert_eq!(RetrieveQuery::new().limit(0).effective_limit(), 10);
        assert_eq!(RetrieveQuery::new().limit(3).effective_limit(), 3);
    }
}

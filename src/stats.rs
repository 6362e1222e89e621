//! Collection statistics for monitoring

use crate::types::{MemoryIndex, MemoryType, Priority, Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Task counts by status and priority
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub by_priority: BTreeMap<String, usize>,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();

        let by_priority = Priority::ALL
            .iter()
            .map(|p| {
                (
                    p.to_string(),
                    tasks.iter().filter(|t| t.priority == *p).count(),
                )
            })
            .collect();

        Self {
            total: tasks.len(),
            pending: count(TaskStatus::Pending),
            in_progress: count(TaskStatus::InProgress),
            completed: count(TaskStatus::Completed),
            failed: count(TaskStatus::Failed),
            by_priority,
        }
    }
}

/// Memory counts and importance summary
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryStats {
    pub total: usize,
    pub categories: usize,
    /// Only types that occur are listed
    pub by_type: BTreeMap<String, usize>,
    /// Mean importance, 0 when empty
    pub average_importance: f64,
}

impl MemoryStats {
    pub fn from_index(index: &MemoryIndex) -> Self {
        let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
        for memory_type in MemoryType::ALL {
            let n = index
                .memories
                .iter()
                .filter(|m| m.memory_type == *memory_type)
                .count();
            if n > 0 {
                by_type.insert(memory_type.to_string(), n);
            }
        }

        let average_importance = if index.memories.is_empty() {
            0.0
        } else {
            let sum: u64 = index.memories.iter().map(|m| m.importance as u64).sum();
            sum as f64 / index.memories.len() as f64
        };

        Self {
            total: index.memories.len(),
            categories: index.categories.len(),
            by_type,
            average_importance,
        }
    }
}

/// Snapshot of both stores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStats {
    pub tasks: TaskStats,
    pub memories: MemoryStats,
    pub generated_at: DateTime<Utc>,
}

//! Maintenance pass: purge old completed tasks, rescore memories

use crate::error::{Result, StoreError};
use crate::memory_store::{MemoryStore, DEFAULT_DECAY_THRESHOLD};
use crate::task_store::TaskStore;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Maintenance configuration
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Completed tasks older than this many days are purged
    pub completed_retention_days: i64,
    /// Threshold reported against when rescoring memories
    pub decay_threshold: f64,
    /// Whether to purge completed tasks
    pub enable_task_purge: bool,
    /// Whether to recompute memory scores
    pub enable_rescore: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            completed_retention_days: 7,
            decay_threshold: DEFAULT_DECAY_THRESHOLD,
            enable_task_purge: true,
            enable_rescore: true,
        }
    }
}

/// Maintenance report
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceReport {
    /// Completed tasks removed
    pub tasks_purged: usize,
    /// Tasks left in the queue
    pub tasks_kept: usize,
    /// Memories whose score was recomputed
    pub memories_rescored: usize,
    /// Memories now scoring below the threshold
    pub memories_below_threshold: usize,
}

/// Run maintenance tasks
pub async fn run_maintenance(
    tasks: &TaskStore,
    memories: &MemoryStore,
    config: &MaintenanceConfig,
) -> Result<MaintenanceReport> {
    if config.completed_retention_days < 0 {
        return Err(StoreError::InvalidArgument(format!(
            "completed_retention_days must not be negative, got {}",
            config.completed_retention_days
        )));
    }

    let mut report = MaintenanceReport::default();

    if config.enable_task_purge {
        let purge = tasks
            .purge_completed(Duration::days(config.completed_retention_days))
            .await?;
        report.tasks_purged = purge.removed;
        report.tasks_kept = purge.kept;
    }

    if config.enable_rescore {
        let rescore = memories.rescore(config.decay_threshold).await?;
        report.memories_rescored = rescore.rescored;
        report.memories_below_threshold = rescore.below_threshold;
    }

    tracing::info!(
        "Maintenance purged {} tasks, rescored {} memories ({} below {})",
        report.tasks_purged,
        report.memories_rescored,
        report.memories_below_threshold,
        config.decay_threshold
    );
    Ok(report)
}

/// Builder for maintenance config
pub struct MaintenanceConfigBuilder {
    config: MaintenanceConfig,
}

impl MaintenanceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: MaintenanceConfig::default(),
        }
    }

    pub fn completed_retention_days(mut self, days: i64) -> Self {
        self.config.completed_retention_days = days;
        self
    }

    pub fn decay_threshold(mut self, threshold: f64) -> Self {
        self.config.decay_threshold = threshold;
        self
    }

    pub fn enable_task_purge(mut self, enable: bool) -> Self {
        self.config.enable_task_purge = enable;
        self
    }

    pub fn enable_rescore(mut self, enable: bool) -> Self {
        self.config.enable_rescore = enable;
        self
    }

    pub fn build(self) -> MaintenanceConfig {
        self.config
    }
}

impl Default for MaintenanceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

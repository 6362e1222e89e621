//! Store configuration

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How strictly task status updates are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Any status may be set from any status
    #[default]
    Permissive,
    /// Only forward moves, plus failed -> pending for retries
    ForwardOnly,
}

/// Where the collections live and how they behave
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory for all documents
    pub data_dir: PathBuf,
    /// Task document file name, relative to `data_dir`
    pub tasks_file: String,
    /// Memory directory, relative to `data_dir`. Archives are written here too.
    pub memory_dir: String,
    /// Memory index file name, relative to `memory_dir`
    pub memory_index_file: String,
    pub transition_policy: TransitionPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./mindqueue_data"),
            tasks_file: "tasks.json".to_string(),
            memory_dir: "memory".to_string(),
            memory_index_file: "index.json".to_string(),
            transition_policy: TransitionPolicy::Permissive,
        }
    }
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::new()
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.data_dir.join(&self.tasks_file)
    }

    pub fn memory_index_path(&self) -> PathBuf {
        self.data_dir
            .join(&self.memory_dir)
            .join(&self.memory_index_file)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(StoreError::Configuration(
                "data_dir must not be empty".to_string(),
            ));
        }

        for (field, value) in [
            ("tasks_file", &self.tasks_file),
            ("memory_index_file", &self.memory_index_file),
        ] {
            if value.is_empty() || Path::new(value).components().count() != 1 {
                return Err(StoreError::Configuration(format!(
                    "{} must be a plain file name, got '{}'",
                    field, value
                )));
            }
        }

        if self.memory_dir.is_empty() {
            return Err(StoreError::Configuration(
                "memory_dir must not be empty".to_string(),
            ));
        }

        if self.tasks_path() == self.memory_index_path() {
            return Err(StoreError::Configuration(
                "task and memory documents must not share a path".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for store config
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
        }
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn tasks_file(mut self, name: impl Into<String>) -> Self {
        self.config.tasks_file = name.into();
        self
    }

    pub fn memory_dir(mut self, name: impl Into<String>) -> Self {
        self.config.memory_dir = name.into();
        self
    }

    pub fn memory_index_file(mut self, name: impl Into<String>) -> Self {
        self.config.memory_index_file = name.into();
        self
    }

    pub fn transition_policy(mut self, policy: TransitionPolicy) -> Self {
        self.config.transition_policy = policy;
        self
    }

    /// Build and validate
    pub fn build(self) -> Result<StoreConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

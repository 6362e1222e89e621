//! Document storage backends
//!
//! A backend holds exactly one collection document plus any number of
//! write-once snapshots. Stores read and write the whole document on
//! every operation.

use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[async_trait]
pub trait DocumentBackend: Send + Sync + std::fmt::Debug {
    fn backend_name(&self) -> &'static str;

    /// Read the raw document. `None` when it has never been written.
    async fn read(&self) -> Result<Option<String>>;

    /// Replace the whole document.
    async fn write(&self, contents: &str) -> Result<()>;

    /// Write a timestamped snapshot next to the document and return where it went.
    async fn write_snapshot(&self, label: &str, contents: &str) -> Result<String>;
}

/// Load a collection document.
///
/// A missing document, or text that is not JSON at all, yields the empty
/// collection so that a first run (or a truncated file) bootstraps cleanly.
/// Well-formed JSON that does not fit the collection schema is an error:
/// saving over it would drop every entry.
pub(crate) async fn load_document<T>(backend: &dyn DocumentBackend) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    let Some(raw) = backend.read().await? else {
        return Ok(T::default());
    };

    let value: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                "Unparsable {} document, starting from an empty collection: {}",
                backend.backend_name(),
                e
            );
            return Ok(T::default());
        }
    };

    serde_json::from_value(value).map_err(|e| {
        tracing::error!(
            "{} document does not match the collection schema: {}",
            backend.backend_name(),
            e
        );
        e.into()
    })
}

/// Serialize and write a whole collection document
pub(crate) async fn save_document<T>(backend: &dyn DocumentBackend, document: &T) -> Result<()>
where
    T: serde::Serialize,
{
    let raw = serde_json::to_string_pretty(document)?;
    backend.write(&raw).await
}

/// JSON file on local disk
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    async fn ensure_dir(&self) -> Result<PathBuf> {
        let dir = self.dir();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}

#[async_trait]
impl DocumentBackend for JsonFileBackend {
    fn backend_name(&self) -> &'static str {
        "json-file"
    }

    async fn read(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, contents: &str) -> Result<()> {
        self.ensure_dir().await?;

        // Atomic replace: write a sibling temp file, then rename over the document
        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, contents).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        tracing::debug!("Wrote {} bytes to {}", contents.len(), self.path.display());
        Ok(())
    }

    async fn write_snapshot(&self, label: &str, contents: &str) -> Result<String> {
        let dir = self.ensure_dir().await?;
        let snapshot = dir.join(format!("{}-{}.json", label, Utc::now().timestamp_millis()));
        tokio::fs::write(&snapshot, contents).await?;

        tracing::info!("Wrote snapshot {}", snapshot.display());
        Ok(snapshot.display().to_string())
    }
}

/// Process-local backend for tests and ephemeral use
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    document: RwLock<Option<String>>,
    snapshots: RwLock<Vec<(String, String)>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing raw document
    pub fn with_document(contents: impl Into<String>) -> Self {
        Self {
            document: RwLock::new(Some(contents.into())),
            snapshots: RwLock::new(Vec::new()),
        }
    }

    /// Snapshots written so far as `(name, contents)`
    pub async fn snapshots(&self) -> Vec<(String, String)> {
        self.snapshots.read().await.clone()
    }

    /// Current raw document
    pub async fn document(&self) -> Option<String> {
        self.document.read().await.clone()
    }
}

#[async_trait]
impl DocumentBackend for InMemoryBackend {
    fn backend_name(&self) -> &'static str {
        "in-memory"
    }

    async fn read(&self) -> Result<Option<String>> {
        Ok(self.document.read().await.clone())
    }

    async fn write(&self, contents: &str) -> Result<()> {
        *self.document.write().await = Some(contents.to_string());
        Ok(())
    }

    async fn write_snapshot(&self, label: &str, contents: &str) -> Result<String> {
        let mut snapshots = self.snapshots.write().await;
        let name = format!("{}-{}-{}", label, Utc::now().timestamp_millis(), snapshots.len());
        snapshots.push((name.clone(), contents.to_string()));
        Ok(name)
    }
}

//! Memory store: tagged facts ranked by a recency/frequency decay score

use crate::decay::{score_on_access, score_on_sweep, DecayScore};
use crate::error::{Result, StoreError};
use crate::stats::MemoryStats;
use crate::storage_backend::{load_document, save_document, DocumentBackend};
use crate::types::{
    new_memory_id, CreateMemoryInput, DecayAction, Memory, MemoryId, MemoryIndex, RetrieveQuery,
    DEFAULT_IMPORTANCE,
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Threshold used by decay sweeps when the caller gives none
pub const DEFAULT_DECAY_THRESHOLD: f64 = 0.01;

/// Label of archive snapshots written by decay sweeps
pub const ARCHIVE_LABEL: &str = "archive";

/// Result of a decay sweep
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecayReport {
    /// Memories that fell below the threshold and left the active collection
    pub processed_count: usize,
    pub action: DecayAction,
    /// Where the archive snapshot went. Always set for archive sweeps.
    pub archive: Option<String>,
}

/// Result of rescoring without removal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RescoreReport {
    pub rescored: usize,
    pub below_threshold: usize,
    pub threshold: f64,
}

/// Apply the retrieval filters, in order: category, type, tags, text, score
pub fn filter_memories<'a>(memories: &'a [Memory], query: &RetrieveQuery) -> Vec<&'a Memory> {
    let needle = query.query.as_ref().map(|q| q.to_lowercase());

    memories
        .iter()
        .filter(|m| query.category.as_ref().map_or(true, |c| &m.category == c))
        .filter(|m| query.memory_type.map_or(true, |t| m.memory_type == t))
        .filter(|m| query.tags.is_empty() || m.has_any_tag(&query.tags))
        .filter(|m| needle.as_ref().map_or(true, |n| m.matches_text(n)))
        .filter(|m| {
            query
                .min_decay_score
                .map_or(true, |min| m.decay_score.value() >= min)
        })
        .collect()
}

/// Highest score first; equal scores put the most recently accessed first.
///
/// Scores compare exactly in ten-thousandths, so two scores one unit apart
/// (0.2001 and 0.2000) are ordered by score and never fall through to the
/// recency tiebreak. A tolerance band would not be transitive.
pub fn rank_memories(memories: &mut [&Memory]) {
    memories.sort_by(|a, b| {
        b.decay_score
            .units()
            .cmp(&a.decay_score.units())
            .then_with(|| b.accessed_at.cmp(&a.accessed_at))
    });
}

fn validate_importance(importance: u8) -> Result<()> {
    if (1..=10).contains(&importance) {
        Ok(())
    } else {
        Err(StoreError::InvalidArgument(format!(
            "importance must be between 1 and 10, got {}",
            importance
        )))
    }
}

fn validate_threshold(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(StoreError::InvalidArgument(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )))
    }
}

/// Persistent memory store
pub struct MemoryStore {
    backend: Arc<dyn DocumentBackend>,
    lock: Mutex<()>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

impl MemoryStore {
    /// Create a memory store over the given backend
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            backend,
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<MemoryIndex> {
        load_document(self.backend.as_ref()).await
    }

    async fn save(&self, index: &MemoryIndex) -> Result<()> {
        save_document(self.backend.as_ref(), index).await
    }

    /// Store a new memory with a fresh decay score
    pub async fn store_memory(&self, input: CreateMemoryInput) -> Result<Memory> {
        let importance = input.importance.unwrap_or(DEFAULT_IMPORTANCE);
        validate_importance(importance)?;

        let memory = Memory::new(input.memory_type, input.category, input.content)
            .with_tags(input.tags)
            .with_importance(importance);

        let _guard = self.lock.lock().await;
        let mut index = self.load().await?;
        index.memories.push(memory.clone());
        if index.register_category(&memory.category) {
            tracing::debug!("Registered new category {}", memory.category);
        }
        index.last_id += 1;
        self.save(&index).await?;

        tracing::info!("Stored memory {} ({})", memory.id, memory.memory_type);
        Ok(memory)
    }

    /// Filtered, ranked and truncated memories. Access statistics are untouched.
    pub async fn retrieve_memory(&self, query: &RetrieveQuery) -> Result<Vec<Memory>> {
        if let Some(min) = query.min_decay_score {
            validate_threshold("min_decay_score", min)?;
        }

        let _guard = self.lock.lock().await;
        let index = self.load().await?;

        let mut matches = filter_memories(&index.memories, query);
        rank_memories(&mut matches);
        matches.truncate(query.effective_limit());

        tracing::debug!("Retrieved {} memories", matches.len());
        Ok(matches.into_iter().cloned().collect())
    }

    /// Record an access and recompute the score with the age factor
    pub async fn update_memory_access(&self, id: &str) -> Result<Memory> {
        let _guard = self.lock.lock().await;
        let mut index = self.load().await?;

        let memory = index
            .memories
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| StoreError::memory_not_found(id))?;

        let now = Utc::now();
        memory.accessed_at = now;
        memory.access_count += 1;
        memory.decay_score = score_on_access(memory, now);
        let updated = memory.clone();

        self.save(&index).await?;
        tracing::debug!(
            "Memory {} accessed {} times, score {}",
            id,
            updated.access_count,
            updated.decay_score
        );
        Ok(updated)
    }

    /// Consolidate several memories into one new entry.
    ///
    /// Ids are resolved in the order given; unknown and repeated ids are
    /// skipped. At least two must resolve.
    pub async fn merge_memories(&self, ids: &[MemoryId], merged_content: &str) -> Result<Memory> {
        let _guard = self.lock.lock().await;
        let mut index = self.load().await?;

        let mut resolved: Vec<&Memory> = Vec::new();
        for id in ids {
            if resolved.iter().any(|m| &m.id == id) {
                continue;
            }
            if let Some(memory) = index.memories.iter().find(|m| &m.id == id) {
                resolved.push(memory);
            }
        }

        if resolved.len() < 2 {
            return Err(StoreError::InvalidArgument(
                "At least 2 memories required for merge".to_string(),
            ));
        }

        let first = resolved[0];
        let mut tags: Vec<String> = Vec::new();
        for tag in resolved.iter().flat_map(|m| m.tags.iter()) {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }

        let merged = Memory {
            id: new_memory_id(),
            memory_type: first.memory_type,
            category: first.category.clone(),
            content: merged_content.to_string(),
            tags,
            importance: resolved.iter().map(|m| m.importance).max().unwrap_or(DEFAULT_IMPORTANCE),
            created_at: resolved
                .iter()
                .map(|m| m.created_at)
                .min()
                .unwrap_or(first.created_at),
            accessed_at: Utc::now(),
            access_count: resolved.iter().map(|m| m.access_count).sum(),
            decay_score: DecayScore::FRESH,
            related_ids: ids.to_vec(),
        };
        let absorbed = resolved.len();

        index.memories.retain(|m| !ids.contains(&m.id));
        index.memories.push(merged.clone());
        self.save(&index).await?;

        tracing::info!("Merged {} memories into {}", absorbed, merged.id);
        Ok(merged)
    }

    /// Rescore every memory without the age factor and drop those below
    /// `threshold`, archiving them first unless the action is delete.
    pub async fn decay_old_memories(
        &self,
        threshold: Option<f64>,
        action: Option<DecayAction>,
    ) -> Result<DecayReport> {
        let threshold = threshold.unwrap_or(DEFAULT_DECAY_THRESHOLD);
        validate_threshold("min_decay_score", threshold)?;
        let action = action.unwrap_or_default();

        let _guard = self.lock.lock().await;
        let mut index = self.load().await?;

        let now = Utc::now();
        for memory in index.memories.iter_mut() {
            memory.decay_score = score_on_sweep(memory, now);
        }

        let (low, keep): (Vec<Memory>, Vec<Memory>) = index
            .memories
            .into_iter()
            .partition(|m| m.decay_score.value() < threshold);

        // Archive sweeps always leave a snapshot, even an empty one
        let archive = match action {
            DecayAction::Archive => {
                let contents = serde_json::to_string_pretty(&low)?;
                Some(self.backend.write_snapshot(ARCHIVE_LABEL, &contents).await?)
            }
            DecayAction::Delete => None,
        };

        index.memories = keep;
        self.save(&index).await?;

        tracing::info!(
            "Decay sweep ({}) removed {} memories below {}",
            action,
            low.len(),
            threshold
        );
        Ok(DecayReport {
            processed_count: low.len(),
            action,
            archive,
        })
    }

    /// Recompute all sweep scores and report how many fall below `threshold`.
    /// Nothing is removed.
    pub async fn rescore(&self, threshold: f64) -> Result<RescoreReport> {
        validate_threshold("threshold", threshold)?;

        let _guard = self.lock.lock().await;
        let mut index = self.load().await?;

        let now = Utc::now();
        let mut below_threshold = 0;
        for memory in index.memories.iter_mut() {
            memory.decay_score = score_on_sweep(memory, now);
            if memory.decay_score.value() < threshold {
                below_threshold += 1;
            }
        }

        self.save(&index).await?;
        Ok(RescoreReport {
            rescored: index.memories.len(),
            below_threshold,
            threshold,
        })
    }

    /// Distinct categories in first-seen order
    pub async fn list_categories(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.categories)
    }

    /// Get a memory by id without tracking the access
    pub async fn get_memory(&self, id: &str) -> Result<Memory> {
        let _guard = self.lock.lock().await;
        self.load()
            .await?
            .memories
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| StoreError::memory_not_found(id))
    }

    pub async fn stats(&self) -> Result<MemoryStats> {
        let _guard = self.lock.lock().await;
        Ok(MemoryStats::from_index(&self.load().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage_backend::InMemoryBackend;
    use crate::types::MemoryType;
    use chrono::Duration;

    fn memory_with(access_count: u64, accessed_days_ago: i64) -> Memory {
        let mut memory = Memory::new(MemoryType::Fact, "research", "content");
        memory.accessed_at = Utc::now() - Duration::days(accessed_days_ago);
        memory.created_at = memory.accessed_at - Duration::days(1);
        memory.access_count = access_count;
        memory
    }

    fn seeded(memories: Vec<Memory>) -> (Arc<InMemoryBackend>, MemoryStore) {
        let mut index = MemoryIndex::default();
        for memory in &memories {
            index.register_category(&memory.category);
        }
        index.last_id = memories.len() as u64;
        index.memories = memories;

        let backend = Arc::new(InMemoryBackend::with_document(
            serde_json::to_string(&index).unwrap(),
        ));
        let store = MemoryStore::new(backend.clone());
        (backend, store)
    }

    fn empty() -> (Arc<InMemoryBackend>, MemoryStore) {
        let backend = Arc::new(InMemoryBackend::new());
        (backend.clone(), MemoryStore::new(backend))
    }

    #[tokio::test]
    async fn test_store_then_retrieve_by_category_and_tag() {
        let (_, store) = empty();
        let memory = store
            .store_memory(
                CreateMemoryInput::new(MemoryType::Preference, "coding", "Prefers tabs")
                    .with_tags(["style", "editor"]),
            )
            .await
            .unwrap();

        let results = store
            .retrieve_memory(&RetrieveQuery::new().category("coding").tag("editor"))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, memory.id);
        assert_eq!(results[0].decay_score.to_string(), "1.0000");
        assert_eq!(results[0].importance, 5);
        assert_eq!(results[0].access_count, 0);
    }

    #[tokio::test]
    async fn test_out_of_range_importance_is_rejected() {
        let (backend, store) = empty();
        let err = store
            .store_memory(
                CreateMemoryInput::new(MemoryType::Fact, "x", "y").with_importance(11),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert!(backend.document().await.is_none());
    }

    #[tokio::test]
    async fn test_categories_are_deduplicated_in_first_seen_order() {
        let (_, store) = empty();
        for category in ["coding", "research", "coding"] {
            store
                .store_memory(CreateMemoryInput::new(MemoryType::Fact, category, "c"))
                .await
                .unwrap();
        }
        assert_eq!(
            store.list_categories().await.unwrap(),
            vec!["coding".to_string(), "research".to_string()]
        );
    }

    #[tokio::test]
    async fn test_retrieve_filters_combine() {
        let (_, store) = empty();
        store
            .store_memory(
                CreateMemoryInput::new(MemoryType::Skill, "coding", "Knows async Rust")
                    .with_tags(["rust"]),
            )
            .await
            .unwrap();
        store
            .store_memory(
                CreateMemoryInput::new(MemoryType::Fact, "coding", "Tokio drives futures")
                    .with_tags(["Runtime"]),
            )
            .await
            .unwrap();
        store
            .store_memory(CreateMemoryInput::new(MemoryType::Fact, "travel", "Likes trains"))
            .await
            .unwrap();

        let by_type = store
            .retrieve_memory(&RetrieveQuery::new().memory_type(MemoryType::Fact))
            .await
            .unwrap();
        assert_eq!(by_type.len(), 2);

        let by_tags = store
            .retrieve_memory(&RetrieveQuery::new().tag("rust").tag("Runtime"))
            .await
            .unwrap();
        assert_eq!(by_tags.len(), 2);

        let by_text = store
            .retrieve_memory(&RetrieveQuery::new().text("RUNTIME"))
            .await
            .unwrap();
        assert_eq!(by_text.len(), 1);
        assert_eq!(by_text[0].content, "Tokio drives futures");

        let by_category_text = store
            .retrieve_memory(&RetrieveQuery::new().text("trav"))
            .await
            .unwrap();
        assert_eq!(by_category_text.len(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_ranks_and_limits() {
        let mut high = memory_with(5, 0);
        high.decay_score = DecayScore::new(0.5);
        let mut tie_old = memory_with(1, 3);
        tie_old.decay_score = DecayScore::new(0.2);
        let mut tie_recent = memory_with(1, 1);
        tie_recent.decay_score = DecayScore::new(0.2);
        let mut low = memory_with(1, 0);
        low.decay_score = DecayScore::new(0.01);

        let (_, store) = seeded(vec![low.clone(), tie_old.clone(), high.clone(), tie_recent.clone()]);

        let ranked = store.retrieve_memory(&RetrieveQuery::new()).await.unwrap();
        let ids: Vec<_> = ranked.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec![high.id.clone(), tie_recent.id.clone(), tie_old.id.clone(), low.id.clone()]);

        let limited = store
            .retrieve_memory(&RetrieveQuery::new().limit(2).min_decay_score(0.1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].id, high.id);
    }

    #[test]
    fn test_rank_one_unit_apart_orders_by_score() {
        let mut older = memory_with(1, 5);
        older.decay_score = DecayScore::new(0.2001);
        let mut newer = memory_with(1, 0);
        newer.decay_score = DecayScore::new(0.2);

        let mut ranked = vec![&newer, &older];
        rank_memories(&mut ranked);
        assert_eq!(ranked[0].id, older.id);
        assert_eq!(ranked[1].id, newer.id);
    }

    #[tokio::test]
    async fn test_retrieve_default_limit_is_ten() {
        let (_, store) = seeded((0..12).map(|_| memory_with(1, 0)).collect());
        let results = store.retrieve_memory(&RetrieveQuery::new()).await.unwrap();
        assert_eq!(results.len(), 10);
    }

    #[tokio::test]
    async fn test_retrieve_does_not_track_access() {
        let (backend, store) = seeded(vec![memory_with(2, 1)]);
        let before = backend.document().await;
        store.retrieve_memory(&RetrieveQuery::new()).await.unwrap();
        assert_eq!(backend.document().await, before);
    }

    #[tokio::test]
    async fn test_update_access_recomputes_score() {
        let (_, store) = empty();
        let memory = store
            .store_memory(CreateMemoryInput::new(MemoryType::Fact, "x", "y"))
            .await
            .unwrap();

        let touched = store.update_memory_access(&memory.id).await.unwrap();
        assert_eq!(touched.access_count, 1);
        assert!(touched.accessed_at >= memory.accessed_at);
        // ln(2) * 0.1 with no elapsed time
        assert_eq!(touched.decay_score.to_string(), "0.0693");
    }

    #[tokio::test]
    async fn test_update_access_unknown_id_leaves_collection_alone() {
        let (backend, store) = seeded(vec![memory_with(1, 1)]);
        let before = backend.document().await;

        let err = store.update_memory_access("mem-missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(backend.document().await, before);
    }

    #[tokio::test]
    async fn test_merge_unions_tags_and_keeps_max_importance() {
        let mut a = memory_with(2, 1).with_tags(["a", "b"]).with_importance(3);
        a.memory_type = MemoryType::Pattern;
        a.category = "habits".to_string();
        let b = memory_with(3, 0).with_tags(["b", "c"]).with_importance(8);
        let earliest = a.created_at.min(b.created_at);

        let (_, store) = seeded(vec![b.clone(), a.clone()]);
        let merged = store
            .merge_memories(&[a.id.clone(), b.id.clone()], "combined")
            .await
            .unwrap();

        let mut tags = merged.tags.clone();
        tags.sort();
        assert_eq!(tags, vec!["a", "b", "c"]);
        assert_eq!(merged.importance, 8);
        assert_eq!(merged.access_count, 5);
        assert_eq!(merged.created_at, earliest);
        assert_eq!(merged.memory_type, MemoryType::Pattern);
        assert_eq!(merged.category, "habits");
        assert_eq!(merged.related_ids, vec![a.id.clone(), b.id.clone()]);
        assert_eq!(merged.decay_score, DecayScore::FRESH);

        let remaining = store.retrieve_memory(&RetrieveQuery::new()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, merged.id);
        assert!(matches!(
            store.get_memory(&a.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_merge_needs_two_resolvable_ids() {
        let a = memory_with(1, 1);
        let (backend, store) = seeded(vec![a.clone()]);
        let before = backend.document().await;

        let err = store
            .merge_memories(&[a.id.clone(), a.id.clone(), "mem-missing".into()], "x")
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert_eq!(backend.document().await, before);
    }

    #[tokio::test]
    async fn test_decay_delete_is_idempotent_after_convergence() {
        let never_accessed = memory_with(0, 0);
        let busy = memory_with(5, 0);
        let stale = memory_with(1, 30);
        let (backend, store) = seeded(vec![never_accessed.clone(), busy.clone(), stale.clone()]);

        let report = store
            .decay_old_memories(Some(0.01), Some(DecayAction::Delete))
            .await
            .unwrap();
        assert_eq!(report.processed_count, 2);
        assert_eq!(report.action, DecayAction::Delete);
        assert!(report.archive.is_none());
        assert!(backend.snapshots().await.is_empty());

        let left = store.get_memory(&busy.id).await.unwrap();
        // ln(6) * 0.1
        assert_eq!(left.decay_score.to_string(), "0.1792");

        let again = store
            .decay_old_memories(Some(0.01), Some(DecayAction::Delete))
            .await
            .unwrap();
        assert_eq!(again.processed_count, 0);
    }

    #[tokio::test]
    async fn test_decay_archive_writes_snapshot() {
        let stale = memory_with(0, 10);
        let busy = memory_with(4, 0);
        let (backend, store) = seeded(vec![stale.clone(), busy]);

        let report = store.decay_old_memories(None, None).await.unwrap();
        assert_eq!(report.action, DecayAction::Archive);
        assert_eq!(report.processed_count, 1);

        let snapshots = backend.snapshots().await;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(report.archive.as_deref(), Some(snapshots[0].0.as_str()));
        let archived: Vec<Memory> = serde_json::from_str(&snapshots[0].1).unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].id, stale.id);
    }

    #[tokio::test]
    async fn test_archive_sweep_with_nothing_low_still_writes_snapshot() {
        let (backend, store) = empty();
        let memory = store
            .store_memory(CreateMemoryInput::new(MemoryType::Fact, "x", "y"))
            .await
            .unwrap();
        store.update_memory_access(&memory.id).await.unwrap();

        let report = store
            .decay_old_memories(None, Some(DecayAction::Archive))
            .await
            .unwrap();
        assert_eq!(report.processed_count, 0);

        let snapshots = backend.snapshots().await;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(report.archive.as_deref(), Some(snapshots[0].0.as_str()));
        let archived: Vec<Memory> = serde_json::from_str(&snapshots[0].1).unwrap();
        assert!(archived.is_empty());
        assert_eq!(store.stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_decay_rejects_negative_threshold() {
        let (_, store) = empty();
        assert!(matches!(
            store.decay_old_memories(Some(-1.0), None).await,
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_rescore_keeps_everything() {
        let (_, store) = seeded(vec![memory_with(0, 0), memory_with(5, 0)]);
        let report = store.rescore(0.01).await.unwrap();
        assert_eq!(report.rescored, 2);
        assert_eq!(report.below_threshold, 1);
        assert_eq!(store.stats().await.unwrap().total, 2);
    }
}

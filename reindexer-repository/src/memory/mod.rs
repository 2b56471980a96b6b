//! In-memory implementation of the index writer.
//!
//! Used by tests throughout the workspace, and usable by embedders that want
//! a reindex target without a search engine. Not gated behind `cfg(test)` so
//! that other crates can use it in their tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::config::SearchIndexConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::{CommitState, IndexWriter};
use reindexer_shared::{ContentRecord, IndexBatch};

/// Changes buffered while commit is suppressed.
#[derive(Debug, Default)]
struct Staged {
    purged: bool,
    upserts: BTreeMap<i64, ContentRecord>,
}

#[derive(Debug)]
struct WriteState {
    commit_state: CommitState,
    staged: Option<Staged>,
}

#[derive(Debug)]
struct Inner {
    committed: RwLock<BTreeMap<i64, ContentRecord>>,
    write: Mutex<WriteState>,
}

/// In-memory search index with buffered commits.
///
/// Cloning yields another handle to the same index, so a test can keep a
/// reader handle while the orchestrator owns the writer.
///
/// # Example
///
/// ```ignore
/// let index = InMemoryIndex::new();
/// index.set_commit_suppressed(true).await?;
/// index.purge_index().await?;
/// index.bulk_index(&batch).await?;
/// assert!(index.is_empty().await); // not yet committed
/// index.set_commit_suppressed(false).await?;
/// assert_eq!(index.len().await, batch.len());
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryIndex {
    inner: Arc<Inner>,
    config: SearchIndexConfig,
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIndex {
    /// Create an empty index with commit active.
    pub fn new() -> Self {
        Self::with_config(SearchIndexConfig::default())
    }

    /// Create an empty index with custom configuration.
    pub fn with_config(config: SearchIndexConfig) -> Self {
        Self::from_parts(BTreeMap::new(), config)
    }

    /// Create an index whose committed generation already holds `records`.
    pub fn seeded(records: impl IntoIterator<Item = ContentRecord>) -> Self {
        let committed = records
            .into_iter()
            .map(|record| (record.content_ref.id, record))
            .collect();
        Self::from_parts(committed, SearchIndexConfig::default())
    }

    fn from_parts(committed: BTreeMap<i64, ContentRecord>, config: SearchIndexConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                committed: RwLock::new(committed),
                write: Mutex::new(WriteState {
                    commit_state: CommitState::Active,
                    staged: None,
                }),
            }),
            config,
        }
    }

    /// Committed entries, ordered by content id.
    pub async fn snapshot(&self) -> Vec<ContentRecord> {
        self.inner.committed.read().await.values().cloned().collect()
    }

    /// Committed entry for a content id.
    pub async fn get(&self, content_id: i64) -> Option<ContentRecord> {
        self.inner.committed.read().await.get(&content_id).cloned()
    }

    /// Number of committed entries.
    pub async fn len(&self) -> usize {
        self.inner.committed.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn commit_state(&self) -> CommitState {
        self.inner.write.lock().await.commit_state
    }

    /// Whether changes are buffered and waiting for a commit.
    pub async fn has_pending_changes(&self) -> bool {
        self.inner.write.lock().await.staged.is_some()
    }
}

#[async_trait]
impl IndexWriter for InMemoryIndex {
    async fn set_commit_suppressed(&self, suppressed: bool) -> Result<(), SearchIndexError> {
        let mut write = self.inner.write.lock().await;

        if suppressed {
            write.commit_state = CommitState::Suppressed;
            return Ok(());
        }

        if let Some(staged) = write.staged.take() {
            let mut committed = self.inner.committed.write().await;
            if staged.purged {
                committed.clear();
            }
            let upserted = staged.upserts.len();
            committed.extend(staged.upserts);
            debug!(
                purged = staged.purged,
                upserted = upserted,
                total = committed.len(),
                "Published staged generation"
            );
        }
        write.commit_state = CommitState::Active;
        Ok(())
    }

    async fn purge_index(&self) -> Result<(), SearchIndexError> {
        let mut write = self.inner.write.lock().await;

        match write.commit_state {
            CommitState::Suppressed => {
                // Replaces anything left over from an earlier failed pass.
                write.staged = Some(Staged {
                    purged: true,
                    upserts: BTreeMap::new(),
                });
            }
            CommitState::Active => {
                self.inner.committed.write().await.clear();
            }
        }
        Ok(())
    }

    async fn bulk_index(&self, batch: &IndexBatch) -> Result<(), SearchIndexError> {
        self.config.validate_batch_size(batch.len())?;

        let mut write = self.inner.write.lock().await;
        let entries = batch
            .iter()
            .map(|record| (record.content_ref.id, record.clone()));

        match write.commit_state {
            CommitState::Suppressed => {
                write
                    .staged
                    .get_or_insert_with(Staged::default)
                    .upserts
                    .extend(entries);
            }
            CommitState::Active => {
                self.inner.committed.write().await.extend(entries);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reindexer_shared::ContentRef;

    fn record(id: i64, version: i64) -> ContentRecord {
        ContentRecord::new(ContentRef::new(id, version), 1, format!("Content {}", id))
    }

    fn batch(ids: &[i64]) -> IndexBatch {
        ids.iter().map(|id| record(*id, 1)).collect::<Vec<_>>().into()
    }

    #[tokio::test]
    async fn test_suppressed_writes_are_invisible_until_commit() {
        let index = InMemoryIndex::seeded(vec![record(9, 1)]);

        index.set_commit_suppressed(true).await.unwrap();
        index.purge_index().await.unwrap();
        index.bulk_index(&batch(&[1, 2])).await.unwrap();

        let ids: Vec<i64> = index.snapshot().await.iter().map(|r| r.content_ref.id).collect();
        assert_eq!(ids, vec![9]);
        assert_eq!(index.commit_state().await, CommitState::Suppressed);

        index.set_commit_suppressed(false).await.unwrap();

        let ids: Vec<i64> = index.snapshot().await.iter().map(|r| r.content_ref.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(!index.has_pending_changes().await);
    }

    #[tokio::test]
    async fn test_active_writes_apply_immediately() {
        let index = InMemoryIndex::seeded(vec![record(9, 1)]);

        index.bulk_index(&batch(&[1])).await.unwrap();
        assert_eq!(index.len().await, 2);

        index.purge_index().await.unwrap();
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_bulk_index_upserts_by_content_id() {
        let index = InMemoryIndex::new();

        index.bulk_index(&batch(&[1])).await.unwrap();
        index
            .bulk_index(&IndexBatch::from(vec![record(1, 4)]))
            .await
            .unwrap();

        assert_eq!(index.len().await, 1);
        assert_eq!(index.get(1).await.unwrap().content_ref.version, 4);
    }

    #[tokio::test]
    async fn test_purge_discards_leftover_staged_changes() {
        let index = InMemoryIndex::new();

        // A pass that failed after ingesting, leaving commit suppressed
        index.set_commit_suppressed(true).await.unwrap();
        index.purge_index().await.unwrap();
        index.bulk_index(&batch(&[1, 2, 3])).await.unwrap();

        // The restart
        index.set_commit_suppressed(true).await.unwrap();
        index.purge_index().await.unwrap();
        index.bulk_index(&batch(&[4])).await.unwrap();
        index.set_commit_suppressed(false).await.unwrap();

        let ids: Vec<i64> = index.snapshot().await.iter().map(|r| r.content_ref.id).collect();
        assert_eq!(ids, vec![4]);
    }

    #[tokio::test]
    async fn test_suppressed_upsert_without_purge_keeps_existing_entries() {
        let index = InMemoryIndex::seeded(vec![record(1, 1)]);

        index.set_commit_suppressed(true).await.unwrap();
        index.bulk_index(&batch(&[2])).await.unwrap();
        index.set_commit_suppressed(false).await.unwrap();

        assert_eq!(index.len().await, 2);
    }

    #[tokio::test]
    async fn test_batch_size_limit() {
        let index = InMemoryIndex::with_config(SearchIndexConfig::with_max_batch_size(2));

        let result = index.bulk_index(&batch(&[1, 2, 3])).await;

        assert!(matches!(
            result,
            Err(SearchIndexError::BatchSizeExceeded { provided: 3, max: 2 })
        ));
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let writer = InMemoryIndex::new();
        let reader = writer.clone();

        writer.bulk_index(&batch(&[5])).await.unwrap();

        assert!(reader.get(5).await.is_some());
    }
}

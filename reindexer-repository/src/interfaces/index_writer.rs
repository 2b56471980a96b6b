//! Index writer trait definition.
//!
//! This module defines the abstract interface the reindex orchestrator uses
//! to rebuild a search index, allowing for different backend implementations
//! (OpenSearch, in-memory, etc.).

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use reindexer_shared::IndexBatch;

/// Whether index mutations become visible as they are made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    /// Mutations are buffered and invisible to readers.
    Suppressed,
    /// Mutations are visible to readers once applied.
    Active,
}

/// Write side of a search index, under explicit commit control.
///
/// The orchestrator calls the operations in this order for a full rebuild:
///
/// 1. `set_commit_suppressed(true)`
/// 2. `purge_index()`
/// 3. `bulk_index(batch)`, any number of times
/// 4. `set_commit_suppressed(false)`
///
/// Readers observe either the generation that was visible before step 1 or
/// the complete generation published by step 4, never anything in between.
///
/// # Failure
///
/// A failing call leaves commit suppressed: buffered changes are neither
/// published nor rolled back until the next `purge_index()` discards them.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`, but a writer is not required to
/// support concurrent rebuilds; callers serialize passes.
#[async_trait]
pub trait IndexWriter: Send + Sync {
    /// Suppress (`true`) or re-enable (`false`) commits.
    ///
    /// Re-enabling publishes everything buffered since suppression
    /// atomically from a reader's point of view.
    async fn set_commit_suppressed(&self, suppressed: bool) -> Result<(), SearchIndexError>;

    /// Remove every entry from the index.
    async fn purge_index(&self) -> Result<(), SearchIndexError>;

    /// Upsert every record of the batch, keyed by document id.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If all records were accepted
    /// * `Err(SearchIndexError::BatchSizeExceeded)` - If the batch exceeds the configured limit
    /// * `Err(SearchIndexError)` - If any record failed to index
    async fn bulk_index(&self, batch: &IndexBatch) -> Result<(), SearchIndexError>;
}

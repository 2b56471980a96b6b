//! Source module for the reindex pipeline.
//!
//! Lists content refs from the store and resolves them into records with a
//! bounded number of loads in flight.

use futures::stream::{BoxStream, StreamExt};
use tracing::warn;

use crate::errors::ReindexError;
use crate::orchestrator::PassState;
use reindexer_repository::{ContentLoader, ContentStoreError, ContentStoreReader};
use reindexer_shared::{ContentRecord, ContentRef};

/// Outcome of resolving one listed ref.
#[derive(Debug)]
pub enum SourceItem {
    /// The record was materialized and is ready to index.
    Loaded(ContentRecord),
    /// The ref vanished between listing and loading.
    Missing(ContentRef),
}

/// Stream every listed ref resolved through `loader`.
///
/// At most `concurrency` loads run at once. Items come out in listing order
/// regardless of which load finishes first, so batches built from the stream
/// are reproducible.
///
/// The stream yields an error and should be dropped when listing fails
/// (`StoreUnavailable`) or a load fails for any reason other than the content
/// having vanished (`LoadError`).
pub fn resolve_all<'a>(
    reader: &'a dyn ContentStoreReader,
    loader: &'a dyn ContentLoader,
    concurrency: usize,
) -> BoxStream<'a, Result<SourceItem, ReindexError>> {
    reader
        .list_all_content_refs()
        .map(move |listed| async move {
            let content_ref =
                listed.map_err(|e| ReindexError::store_unavailable(PassState::Listing, e))?;

            match loader.load(content_ref).await {
                Ok(record) => Ok(SourceItem::Loaded(record)),
                Err(e) if e.is_recoverable() => {
                    warn!(
                        content_id = content_ref.id,
                        version = content_ref.version,
                        "Content vanished before it could be loaded, skipping"
                    );
                    Ok(SourceItem::Missing(content_ref))
                }
                Err(e @ ContentStoreError::Unavailable(_)) => {
                    Err(ReindexError::store_unavailable(PassState::Loading, e))
                }
                Err(e) => Err(ReindexError::load(content_ref, PassState::Loading, e)),
            }
        })
        .buffered(concurrency.max(1))
        .boxed()
}

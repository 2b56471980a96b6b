//! Content store trait definitions.
//!
//! Listing and loading are split so that the listing query only ever reads
//! identifiers and versions, never content bodies.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::ContentStoreError;
use reindexer_shared::{ContentRecord, ContentRef};

/// Lazy stream of content refs produced by a reader.
pub type ContentRefStream<'a> = BoxStream<'a, Result<ContentRef, ContentStoreError>>;

/// Lists the content held by the system of record.
pub trait ContentStoreReader: Send + Sync {
    /// Stream the id and current version of every published content item.
    ///
    /// The stream is lazy and finite. Calling this again starts a fresh
    /// listing. An empty store yields an empty stream, not an error.
    ///
    /// # Errors
    ///
    /// Items are `Err(ContentStoreError::Unavailable)` when the store cannot
    /// be reached or the query cannot be prepared or executed.
    fn list_all_content_refs(&self) -> ContentRefStream<'_>;
}

/// Resolves content refs into fully materialized records.
#[async_trait]
pub trait ContentLoader: Send + Sync {
    /// Load the record for a single ref.
    ///
    /// Loading has no side effects; loading the same ref twice yields
    /// equivalent records.
    ///
    /// # Returns
    ///
    /// * `Ok(ContentRecord)` - The materialized record
    /// * `Err(ContentStoreError::ContentNotFound)` - If the ref no longer exists
    /// * `Err(ContentStoreError::Load)` - If the persistence layer failed
    async fn load(&self, content_ref: ContentRef) -> Result<ContentRecord, ContentStoreError>;
}

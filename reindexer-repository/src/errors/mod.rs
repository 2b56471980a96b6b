//! Error types for the reindexer repository.

mod content_store_error;
mod search_index_error;

pub use content_store_error::ContentStoreError;
pub use search_index_error::SearchIndexError;

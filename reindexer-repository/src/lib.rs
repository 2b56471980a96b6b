//! # Reindexer Repository
//!
//! This crate provides the traits the reindex pipeline is written against
//! and their implementations: a SQL content store for the system of record,
//! an OpenSearch index writer, and an in-memory index writer.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod sql;

pub use config::SearchIndexConfig;
pub use errors::{ContentStoreError, SearchIndexError};
pub use interfaces::{CommitState, ContentLoader, ContentRefStream, ContentStoreReader, IndexWriter};
pub use memory::InMemoryIndex;
pub use opensearch::OpenSearchIndexWriter;
pub use sql::SqlContentStore;

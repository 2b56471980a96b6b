//! Interface definitions for the reindexer's collaborators.
//!
//! The orchestrator only ever talks to these traits, so the system of record
//! and the search backend can be swapped (SQL, OpenSearch, in-memory, mocks).

mod content_store;
mod index_writer;

pub use content_store::{ContentLoader, ContentRefStream, ContentStoreReader};
pub use index_writer::{CommitState, IndexWriter};

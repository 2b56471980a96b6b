//! # Reindexer Shared
//!
//! Shared types used across the content reindexer crates: content
//! references and records flowing from the system of record to the search
//! index, batches submitted to the index, and the pass summary and events
//! reported once a pass finishes.

mod content;
mod event;
mod summary;

pub use content::{ContentField, ContentRecord, ContentRef, IndexBatch};
pub use event::ReindexEvent;
pub use summary::ReindexSummary;

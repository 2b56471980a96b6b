//! Result of a completed reindex pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ContentRef;

/// Outcome of a successful reindex pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReindexSummary {
    /// Identifier of the pass, shared with the events it published.
    pub pass_id: Uuid,
    /// Number of records written to the new index generation.
    pub indexed: usize,
    /// Number of refs that vanished between listing and loading.
    pub skipped: usize,
    /// The refs that were skipped, in listing order.
    pub skipped_refs: Vec<ContentRef>,
    /// Number of `bulk_index` calls issued.
    pub batches: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ReindexSummary {
    /// Wall-clock duration of the pass.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

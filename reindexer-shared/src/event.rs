//! Notifications emitted by the orchestrator.
//!
//! Events carry plain data only. Subscribers are external; the pipeline
//! publishes and never waits on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle notification for a reindex pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReindexEvent {
    /// A pass acquired the lock and began listing content.
    Started { pass_id: Uuid, at: DateTime<Utc> },
    /// The new index generation was committed.
    Completed {
        pass_id: Uuid,
        indexed: usize,
        skipped: usize,
        at: DateTime<Utc>,
    },
    /// The pass stopped on a fatal error; the previous generation is still visible.
    Aborted {
        pass_id: Uuid,
        stage: String,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl ReindexEvent {
    pub fn pass_id(&self) -> Uuid {
        match self {
            Self::Started { pass_id, .. }
            | Self::Completed { pass_id, .. }
            | Self::Aborted { pass_id, .. } => *pass_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagging() {
        let event = ReindexEvent::Completed {
            pass_id: Uuid::new_v4(),
            indexed: 2,
            skipped: 1,
            at: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "completed");
        assert_eq!(json["indexed"], 2);
        assert_eq!(json["skipped"], 1);
    }
}

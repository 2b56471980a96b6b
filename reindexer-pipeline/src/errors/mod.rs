//! Error types for the reindex pipeline.

use reindexer_repository::{ContentStoreError, SearchIndexError};
use reindexer_shared::ContentRef;
use thiserror::Error;

use crate::orchestrator::PassState;

/// Errors that stop a reindex pass.
///
/// Per-record `ContentNotFound` failures never surface here; they are
/// counted in the pass summary instead.
#[derive(Error, Debug)]
pub enum ReindexError {
    /// The content store could not be reached; no index mutation was attempted
    /// unless the pass had already purged.
    #[error("Content store unavailable while {stage}: {source}")]
    StoreUnavailable {
        stage: PassState,
        source: ContentStoreError,
    },

    /// The persistence layer failed to load a ref.
    #[error("Failed to load {content_ref} while {stage}: {source}")]
    LoadError {
        content_ref: ContentRef,
        stage: PassState,
        source: ContentStoreError,
    },

    /// The index writer failed; commit stays suppressed and the previous
    /// generation remains visible.
    #[error("Index write failed while {stage}: {source}")]
    IndexWriteFailed {
        stage: PassState,
        source: SearchIndexError,
    },

    /// Another pass holds the lock. Retry later.
    #[error("A reindex pass is already running")]
    PassAlreadyRunning,

    /// Configuration error.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ReindexError {
    /// Create a store unavailable error.
    pub fn store_unavailable(stage: PassState, source: ContentStoreError) -> Self {
        Self::StoreUnavailable { stage, source }
    }

    /// Create a load error.
    pub fn load(content_ref: ContentRef, stage: PassState, source: ContentStoreError) -> Self {
        Self::LoadError {
            content_ref,
            stage,
            source,
        }
    }

    /// Create an index write error.
    pub fn index_write(stage: PassState, source: SearchIndexError) -> Self {
        Self::IndexWriteFailed { stage, source }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// The step the pass was in when it failed, if it had started.
    pub fn stage(&self) -> Option<PassState> {
        match self {
            Self::StoreUnavailable { stage, .. }
            | Self::LoadError { stage, .. }
            | Self::IndexWriteFailed { stage, .. } => Some(*stage),
            Self::PassAlreadyRunning | Self::InvalidConfig(_) => None,
        }
    }

    /// Report the error as raised in `stage`.
    ///
    /// Source errors are raised while loading, but once the first chunk has
    /// been purged and ingested the pass is already `Ingesting`.
    pub fn with_stage(self, stage: PassState) -> Self {
        match self {
            Self::StoreUnavailable { source, .. } => Self::StoreUnavailable { stage, source },
            Self::LoadError {
                content_ref,
                source,
                ..
            } => Self::LoadError {
                content_ref,
                stage,
                source,
            },
            Self::IndexWriteFailed { source, .. } => Self::IndexWriteFailed { stage, source },
            other => other,
        }
    }

    /// The ref being loaded when the pass failed, if any.
    pub fn content_ref(&self) -> Option<ContentRef> {
        match self {
            Self::LoadError { content_ref, .. } => Some(*content_ref),
            _ => None,
        }
    }
}

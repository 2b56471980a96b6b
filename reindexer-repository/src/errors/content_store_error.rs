//! Content store error types.
//!
//! This module defines the errors that can occur while listing or loading
//! content from the system of record.

use reindexer_shared::ContentRef;
use thiserror::Error;

/// Errors that can occur during content store operations.
#[derive(Debug, Clone, Error)]
pub enum ContentStoreError {
    /// The store could not be reached, or the listing query could not be
    /// prepared or executed.
    #[error("Content store unavailable: {0}")]
    Unavailable(String),

    /// The referenced content no longer exists.
    #[error("Content not found: {0}")]
    ContentNotFound(ContentRef),

    /// Loading the referenced content failed below the persistence layer.
    #[error("Failed to load {content_ref}: {message}")]
    Load {
        content_ref: ContentRef,
        message: String,
    },
}

impl ContentStoreError {
    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a content not found error.
    pub fn not_found(content_ref: ContentRef) -> Self {
        Self::ContentNotFound(content_ref)
    }

    /// Create a load error.
    pub fn load(content_ref: ContentRef, msg: impl Into<String>) -> Self {
        Self::Load {
            content_ref,
            message: msg.into(),
        }
    }

    /// Whether the error only affects the one ref and the pass may continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ContentNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_not_found_is_recoverable() {
        let content_ref = ContentRef::new(2, 1);

        assert!(ContentStoreError::not_found(content_ref).is_recoverable());
        assert!(!ContentStoreError::load(content_ref, "disk I/O error").is_recoverable());
        assert!(!ContentStoreError::unavailable("refused").is_recoverable());
    }

    #[test]
    fn test_load_error_message() {
        let err = ContentStoreError::load(ContentRef::new(3, 2), "disk I/O error");
        assert_eq!(err.to_string(), "Failed to load content #3 v2: disk I/O error");
    }
}

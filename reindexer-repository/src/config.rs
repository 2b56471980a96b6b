//! Configuration types for index writers.

/// Configuration shared by the index writer implementations.
#[derive(Debug, Clone)]
pub struct SearchIndexConfig {
    /// Maximum number of records accepted in a single `bulk_index` call.
    /// Set to None to disable the limit (not recommended for production).
    pub max_batch_size: Option<usize>,
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            max_batch_size: Some(1000),
        }
    }
}

impl SearchIndexConfig {
    /// Create a config with no batch size limit (use with caution).
    pub fn unlimited() -> Self {
        Self {
            max_batch_size: None,
        }
    }

    /// Create a config with a custom batch size limit.
    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: Some(max_batch_size),
        }
    }

    /// Check a batch size against the configured limit.
    pub(crate) fn validate_batch_size(
        &self,
        size: usize,
    ) -> Result<(), crate::errors::SearchIndexError> {
        if let Some(max) = self.max_batch_size {
            if size > max {
                return Err(crate::errors::SearchIndexError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }
}

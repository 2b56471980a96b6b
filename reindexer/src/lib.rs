//! # Reindexer
//!
//! Main library for the content reindexer.
//!
//! This crate provides the entry point configuration and wiring for running
//! a single reindex pass against the content store and the search index.

pub mod config;

pub use config::{Dependencies, Settings};

use thiserror::Error;

/// Errors that can occur during reindexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Content store error.
    #[error("Content store error: {0}")]
    StoreError(#[from] reindexer_repository::ContentStoreError),

    /// Search index error.
    #[error("Search error: {0}")]
    SearchError(#[from] reindexer_repository::SearchIndexError),

    /// Reindex pass error.
    #[error("Reindex error: {0}")]
    ReindexError(#[from] reindexer_pipeline::ReindexError),

    /// The process was interrupted before the pass finished.
    #[error("Reindex pass interrupted")]
    Interrupted,

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

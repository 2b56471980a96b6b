//! OpenSearch implementation of the index writer.
//!
//! This module provides a concrete implementation of `IndexWriter`
//! using OpenSearch as the backend.

mod client;
mod index_config;

pub use client::OpenSearchIndexWriter;
pub use index_config::{IndexConfig, DEFAULT_ALIAS};

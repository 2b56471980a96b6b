//! OpenSearch index configuration and mappings.
//!
//! This module defines the alias the reindexer publishes through, the naming
//! of index generations behind it, and the settings and mappings each
//! generation is created with.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

/// The default alias readers query.
pub const DEFAULT_ALIAS: &str = "content";

/// Refresh interval restored on a generation once it is published.
const LIVE_REFRESH_INTERVAL: &str = "1s";

/// Where the index lives and how each generation is laid out.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Alias readers query; always points at exactly one generation.
    pub alias: String,
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ALIAS)
    }
}

impl IndexConfig {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            number_of_shards: 1,
            number_of_replicas: 1,
        }
    }

    /// Name a new generation: `<alias>-<yyyymmddhhmmss>-<8 hex chars>`.
    ///
    /// The random suffix keeps two generations created within the same
    /// second apart.
    pub fn generation_name(&self, now: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}-{}-{}", self.alias, now.format("%Y%m%d%H%M%S"), &suffix[..8])
    }

    /// Whether `index` is a generation created for this alias.
    pub fn is_generation(&self, index: &str) -> bool {
        index
            .strip_prefix(&self.alias)
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|rest| rest.len() == 23 && rest.as_bytes()[14] == b'-')
    }

    /// Settings and mappings for a new generation.
    ///
    /// Staged generations are created with refresh disabled so that nothing
    /// is made searchable before the alias points at them.
    pub fn index_settings(&self, refresh_enabled: bool) -> Value {
        let refresh_interval = if refresh_enabled {
            json!(LIVE_REFRESH_INTERVAL)
        } else {
            json!("-1")
        };

        json!({
            "settings": {
                "number_of_shards": self.number_of_shards,
                "number_of_replicas": self.number_of_replicas,
                "refresh_interval": refresh_interval
            },
            "mappings": {
                "properties": {
                    "content_id": { "type": "long" },
                    "version": { "type": "integer" },
                    "content_type_id": { "type": "long" },
                    "remote_id": { "type": "keyword" },
                    "name": {
                        "type": "text",
                        "fields": {
                            "raw": { "type": "keyword" }
                        }
                    },
                    "main_language_code": { "type": "keyword" },
                    "section_id": { "type": "long" },
                    "owner_id": { "type": "long" },
                    "published": { "type": "date" },
                    "modified": { "type": "date" },
                    "fields": {
                        "type": "nested",
                        "properties": {
                            "identifier": { "type": "keyword" },
                            "language_code": { "type": "keyword" },
                            "value": { "type": "text" }
                        }
                    },
                    "indexed_at": { "type": "date" }
                }
            }
        })
    }

    /// Settings applied to a staged generation right before it is published.
    pub fn live_settings() -> Value {
        json!({ "index": { "refresh_interval": LIVE_REFRESH_INTERVAL } })
    }
}

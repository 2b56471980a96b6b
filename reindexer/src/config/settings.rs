//! Runtime settings read from the environment.

use std::env;
use std::str::FromStr;

use crate::IndexingError;
use reindexer_pipeline::OrchestratorConfig;
use reindexer_repository::SearchIndexConfig;

/// Default content database URL.
const DEFAULT_DATABASE_URL: &str = "sqlite://content.db";

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default alias readers query.
const DEFAULT_INDEX_ALIAS: &str = "content";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Everything the binary needs to build its dependencies.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub opensearch_url: String,
    pub index_alias: String,
    pub log_format: LogFormat,
    pub orchestrator: OrchestratorConfig,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `CONTENT_DATABASE_URL`: content database (default: sqlite://content.db)
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `SEARCH_INDEX_ALIAS`: alias readers query (default: content)
    /// - `REINDEX_CHUNK_SIZE`: records per bulk call (default: 500)
    /// - `REINDEX_LOAD_CONCURRENCY`: loads in flight (default: 8)
    /// - `REINDEX_MAX_RETRIES`: bulk retries on transient errors (default: 3)
    /// - `LOG_FORMAT`: `json` for JSON logs, anything else for text
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns the value of a variable
    /// if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = OrchestratorConfig::default();
        let orchestrator = OrchestratorConfig {
            chunk_size: parse_or(&lookup, "REINDEX_CHUNK_SIZE", defaults.chunk_size)?,
            load_concurrency: parse_or(
                &lookup,
                "REINDEX_LOAD_CONCURRENCY",
                defaults.load_concurrency,
            )?,
            max_retries: parse_or(&lookup, "REINDEX_MAX_RETRIES", defaults.max_retries)?,
            ..defaults
        };
        orchestrator
            .validate()
            .map_err(|e| IndexingError::config(e.to_string()))?;

        let log_format = match lookup("LOG_FORMAT") {
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            database_url: lookup("CONTENT_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            opensearch_url: lookup("OPENSEARCH_URL")
                .unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string()),
            index_alias: lookup("SEARCH_INDEX_ALIAS")
                .unwrap_or_else(|| DEFAULT_INDEX_ALIAS.to_string()),
            log_format,
            orchestrator,
        })
    }

    /// Writer limits that admit every chunk the orchestrator submits.
    ///
    /// The writer default caps a bulk call at 1000 records; a larger
    /// `REINDEX_CHUNK_SIZE` raises the cap to match.
    pub fn search_index_config(&self) -> SearchIndexConfig {
        let config = SearchIndexConfig::default();
        match config.max_batch_size {
            Some(max) if max < self.orchestrator.chunk_size => {
                SearchIndexConfig::with_max_batch_size(self.orchestrator.chunk_size)
            }
            _ => config,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, IndexingError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| IndexingError::config(format!("Invalid {} '{}': {}", key, raw, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reindexer_repository::{IndexWriter, InMemoryIndex};
    use reindexer_shared::{ContentRecord, ContentRef, IndexBatch};
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();

        assert_eq!(settings.database_url, "sqlite://content.db");
        assert_eq!(settings.opensearch_url, "http://localhost:9200");
        assert_eq!(settings.index_alias, "content");
        assert_eq!(settings.log_format, LogFormat::Text);
        assert_eq!(settings.orchestrator.chunk_size, 500);
        assert_eq!(settings.orchestrator.load_concurrency, 8);
        assert_eq!(settings.orchestrator.max_retries, 3);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("CONTENT_DATABASE_URL", "sqlite:///var/lib/cms/content.db"),
            ("OPENSEARCH_URL", "http://search:9200"),
            ("SEARCH_INDEX_ALIAS", "site-content"),
            ("REINDEX_CHUNK_SIZE", " 250 "),
            ("REINDEX_LOAD_CONCURRENCY", "4"),
            ("REINDEX_MAX_RETRIES", "0"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(settings.database_url, "sqlite:///var/lib/cms/content.db");
        assert_eq!(settings.opensearch_url, "http://search:9200");
        assert_eq!(settings.index_alias, "site-content");
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.orchestrator.chunk_size, 250);
        assert_eq!(settings.orchestrator.load_concurrency, 4);
        assert_eq!(settings.orchestrator.max_retries, 0);
    }

    #[test]
    fn test_search_index_config_follows_chunk_size() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.search_index_config().max_batch_size, Some(1000));

        let settings = Settings::from_lookup(lookup(&[("REINDEX_CHUNK_SIZE", "1200")])).unwrap();
        assert_eq!(settings.search_index_config().max_batch_size, Some(1200));
    }

    #[tokio::test]
    async fn test_writer_accepts_full_chunk_above_default_limit() {
        let settings = Settings::from_lookup(lookup(&[("REINDEX_CHUNK_SIZE", "1200")])).unwrap();
        let index = InMemoryIndex::with_config(settings.search_index_config());
        let batch: IndexBatch = (1..=1200)
            .map(|id| ContentRecord::new(ContentRef::new(id, 1), 1, format!("Content {}", id)))
            .collect::<Vec<_>>()
            .into();

        index.bulk_index(&batch).await.unwrap();

        assert_eq!(index.len().await, 1200);
    }

    #[test]
    fn test_rejects_unparsable_numbers() {
        let result = Settings::from_lookup(lookup(&[("REINDEX_CHUNK_SIZE", "lots")]));

        match result {
            Err(IndexingError::ConfigError(msg)) => assert!(msg.contains("REINDEX_CHUNK_SIZE")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_invalid_orchestrator_config() {
        let result = Settings::from_lookup(lookup(&[("REINDEX_LOAD_CONCURRENCY", "0")]));

        assert!(matches!(result, Err(IndexingError::ConfigError(_))));
    }
}

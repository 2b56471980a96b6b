//! OpenSearch index writer implementation.
//!
//! This module provides the concrete implementation of `IndexWriter` using
//! the OpenSearch Rust client.
//!
//! Commit suppression is implemented with index generations behind an alias:
//! purging while suppressed creates a fresh, empty generation that readers
//! cannot see, ingestion fills it, and re-enabling commit repoints the alias
//! in a single `_aliases` request. The previous generation keeps serving
//! reads until that moment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{
        IndicesCreateParts, IndicesDeleteParts, IndicesExistsAliasParts, IndicesGetAliasParts,
        IndicesGetParts, IndicesPutSettingsParts, IndicesRefreshParts,
    },
    params::Refresh,
    BulkParts, DeleteByQueryParts, OpenSearch,
};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::SearchIndexConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::{CommitState, IndexWriter};
use crate::opensearch::index_config::IndexConfig;
use reindexer_shared::{ContentRecord, IndexBatch};

#[derive(Debug)]
struct GenerationState {
    commit_state: CommitState,
    /// Generation being filled while commit is suppressed.
    staged: Option<String>,
}

/// OpenSearch index writer.
///
/// # Example
///
/// ```ignore
/// use reindexer_repository::opensearch::{IndexConfig, OpenSearchIndexWriter};
///
/// let writer = OpenSearchIndexWriter::new(
///     "http://localhost:9200",
///     IndexConfig::new("content"),
///     SearchIndexConfig::default(),
/// )
/// .await?;
/// writer.ensure_index_exists().await?;
/// ```
pub struct OpenSearchIndexWriter {
    client: OpenSearch,
    index_config: IndexConfig,
    config: SearchIndexConfig,
    state: Mutex<GenerationState>,
}

impl OpenSearchIndexWriter {
    /// Create a new OpenSearch writer connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The alias and generation layout
    /// * `config` - Writer limits
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchIndexWriter)` - A new writer instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(
        url: &str,
        index_config: IndexConfig,
        config: SearchIndexConfig,
    ) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            alias = %index_config.alias,
            "Created OpenSearch index writer"
        );

        Ok(Self {
            client,
            index_config,
            config,
            state: Mutex::new(GenerationState {
                commit_state: CommitState::Active,
                staged: None,
            }),
        })
    }

    /// Check if the cluster is reachable and not red.
    pub async fn health_check(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if !response.status_code().is_success() {
            return Ok(false);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;
        let status = body.get("status").and_then(Value::as_str).unwrap_or("red");

        debug!(status = %status, "Cluster health");
        Ok(status != "red")
    }

    /// Ensure the alias exists and points at a generation.
    ///
    /// On a fresh cluster this creates an empty, live generation and points
    /// the alias at it, so readers can query before the first pass.
    pub async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
        let alias = self.index_config.alias.as_str();
        let response = self
            .client
            .indices()
            .exists_alias(IndicesExistsAliasParts::Name(&[alias]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if response.status_code().is_success() {
            debug!(alias = %alias, "Alias already exists");
            return Ok(());
        }

        let generation = self.index_config.generation_name(Utc::now());
        self.create_generation(&generation, true).await?;

        let response = self
            .client
            .indices()
            .update_aliases()
            .body(alias_swap_actions(alias, &[], &generation))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;
        Self::check_response(response, SearchIndexError::IndexError).await?;

        info!(alias = %alias, generation = %generation, "Created initial index generation");
        Ok(())
    }

    async fn create_generation(
        &self,
        name: &str,
        refresh_enabled: bool,
    ) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(name))
            .body(self.index_config.index_settings(refresh_enabled))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;
        Self::check_response(response, SearchIndexError::IndexError).await?;

        debug!(generation = %name, "Created index generation");
        Ok(())
    }

    async fn delete_generations(&self, names: &[String]) -> Result<(), SearchIndexError> {
        if names.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(names.as_slice()))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        // 404 is acceptable - the generation may already be gone
        if response.status_code().as_u16() == 404 {
            return Ok(());
        }
        Self::check_response(response, SearchIndexError::IndexError).await?;
        Ok(())
    }

    /// Generations the alias currently points at.
    async fn live_generations(&self) -> Result<Vec<String>, SearchIndexError> {
        let alias = self.index_config.alias.as_str();
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Name(&[alias]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if response.status_code().as_u16() == 404 {
            return Ok(Vec::new());
        }

        let body = Self::check_response(response, SearchIndexError::CommitError).await?;
        Ok(body
            .as_object()
            .map(|indices| indices.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// Every generation index of this alias, aliased or not.
    async fn all_generations(&self) -> Result<Vec<String>, SearchIndexError> {
        let pattern = format!("{}-*", self.index_config.alias);
        let response = self
            .client
            .indices()
            .get(IndicesGetParts::Index(&[pattern.as_str()]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let body = Self::check_response(response, SearchIndexError::IndexError).await?;
        Ok(body
            .as_object()
            .map(|indices| indices.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// Make the staged generation searchable and point the alias at it.
    async fn publish(&self, staged: &str) -> Result<(), SearchIndexError> {
        let alias = self.index_config.alias.as_str();

        let response = self
            .client
            .indices()
            .put_settings(IndicesPutSettingsParts::Index(&[staged]))
            .body(IndexConfig::live_settings())
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;
        Self::check_response(response, SearchIndexError::CommitError).await?;

        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[staged]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;
        Self::check_response(response, SearchIndexError::CommitError).await?;

        let previous: Vec<String> = self
            .live_generations()
            .await?
            .into_iter()
            .filter(|index| index != staged)
            .collect();

        let response = self
            .client
            .indices()
            .update_aliases()
            .body(alias_swap_actions(alias, &previous, staged))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;
        Self::check_response(response, SearchIndexError::CommitError).await?;

        info!(
            alias = %alias,
            generation = %staged,
            replaced = ?previous,
            "Published index generation"
        );

        // The swap is done; a leftover generation only costs disk space.
        // Generations staged by interrupted passes were never aliased, so
        // sweep everything but the published one.
        let stale = match self.all_generations().await {
            Ok(all) => stale_generations(&self.index_config, all, staged),
            Err(e) => {
                warn!(error = %e, "Failed to list generations, deleting replaced ones only");
                stale_generations(&self.index_config, previous, staged)
            }
        };
        if let Err(e) = self.delete_generations(&stale).await {
            warn!(error = %e, generations = ?stale, "Failed to delete replaced generations");
        }

        Ok(())
    }

    /// Turn a non-success response into an error built by `make_error`.
    async fn check_response(
        response: Response,
        make_error: fn(String) -> SearchIndexError,
    ) -> Result<Value, SearchIndexError> {
        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "OpenSearch request failed");
            return Err(make_error(format!(
                "Request failed with status {}: {}",
                status, error_body
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| make_error(format!("Failed to parse response: {}", e)))
    }
}

/// Build the document stored for a record.
fn document(record: &ContentRecord, indexed_at: DateTime<Utc>) -> Value {
    json!({
        "content_id": record.content_ref.id,
        "version": record.content_ref.version,
        "content_type_id": record.content_type_id,
        "remote_id": record.remote_id,
        "name": record.name,
        "main_language_code": record.main_language_code,
        "section_id": record.section_id,
        "owner_id": record.owner_id,
        "published": record.published,
        "modified": record.modified,
        "fields": record.fields,
        "indexed_at": indexed_at
    })
}

/// Build the NDJSON body of a bulk request: one action line and one document
/// line per record.
fn bulk_body(batch: &IndexBatch, indexed_at: DateTime<Utc>) -> Vec<JsonBody<Value>> {
    let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(batch.len() * 2);
    for record in batch {
        body.push(json!({ "index": { "_id": record.document_id() } }).into());
        body.push(document(record, indexed_at).into());
    }
    body
}

/// Collect per-item failures from a bulk response.
fn bulk_failures(response: &Value) -> Vec<String> {
    if !response.get("errors").and_then(Value::as_bool).unwrap_or(false) {
        return Vec::new();
    }

    response
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("index"))
                .filter_map(|index| {
                    let error = index.get("error")?;
                    let id = index.get("_id").and_then(Value::as_str).unwrap_or("?");
                    let reason = error
                        .get("reason")
                        .and_then(Value::as_str)
                        .or_else(|| error.get("type").and_then(Value::as_str))
                        .unwrap_or("unknown");
                    Some(format!("{}: {}", id, reason))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Generations among `indices` that can be deleted once `live` is published.
fn stale_generations(
    index_config: &IndexConfig,
    indices: impl IntoIterator<Item = String>,
    live: &str,
) -> Vec<String> {
    let mut stale: Vec<String> = indices
        .into_iter()
        .filter(|index| index != live && index_config.is_generation(index))
        .collect();
    stale.sort();
    stale
}

/// Build the `_aliases` body that moves `alias` from `previous` to `next`.
///
/// All actions run atomically on the cluster.
fn alias_swap_actions(alias: &str, previous: &[String], next: &str) -> Value {
    let mut actions: Vec<Value> = previous
        .iter()
        .map(|index| json!({ "remove": { "index": index, "alias": alias } }))
        .collect();
    actions.push(json!({ "add": { "index": next, "alias": alias } }));
    json!({ "actions": actions })
}

#[async_trait]
impl IndexWriter for OpenSearchIndexWriter {
    #[instrument(skip(self), fields(alias = %self.index_config.alias))]
    async fn set_commit_suppressed(&self, suppressed: bool) -> Result<(), SearchIndexError> {
        let mut state = self.state.lock().await;

        if suppressed {
            state.commit_state = CommitState::Suppressed;
            return Ok(());
        }

        if let Some(staged) = state.staged.clone() {
            // On failure the staged generation is kept and commit stays
            // suppressed; the next purge replaces it.
            self.publish(&staged).await?;
            state.staged = None;
        }
        state.commit_state = CommitState::Active;
        Ok(())
    }

    #[instrument(skip(self), fields(alias = %self.index_config.alias))]
    async fn purge_index(&self) -> Result<(), SearchIndexError> {
        let mut state = self.state.lock().await;

        match state.commit_state {
            CommitState::Suppressed => {
                if let Some(leftover) = state.staged.take() {
                    info!(generation = %leftover, "Discarding unpublished generation");
                    self.delete_generations(&[leftover]).await?;
                }
                let generation = self.index_config.generation_name(Utc::now());
                self.create_generation(&generation, false).await?;
                state.staged = Some(generation);
            }
            CommitState::Active => {
                let alias = self.index_config.alias.as_str();
                let response = self
                    .client
                    .delete_by_query(DeleteByQueryParts::Index(&[alias]))
                    .refresh(true)
                    .body(json!({ "query": { "match_all": {} } }))
                    .send()
                    .await
                    .map_err(|e| SearchIndexError::connection(e.to_string()))?;
                Self::check_response(response, SearchIndexError::IndexError).await?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self, batch), fields(count = batch.len()))]
    async fn bulk_index(&self, batch: &IndexBatch) -> Result<(), SearchIndexError> {
        self.config.validate_batch_size(batch.len())?;
        if batch.is_empty() {
            return Ok(());
        }

        let state = self.state.lock().await;
        let (target, refresh) = match (state.commit_state, state.staged.as_deref()) {
            (CommitState::Suppressed, Some(staged)) => (staged.to_string(), Refresh::False),
            (CommitState::Suppressed, None) => {
                return Err(SearchIndexError::validation(
                    "bulk index while commit is suppressed requires a purged generation",
                ));
            }
            (CommitState::Active, _) => (self.index_config.alias.clone(), Refresh::True),
        };

        let response = self
            .client
            .bulk(BulkParts::Index(&target))
            .refresh(refresh)
            .body(bulk_body(batch, Utc::now()))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let body = Self::check_response(response, SearchIndexError::BulkOperationError).await?;
        let failures = bulk_failures(&body);
        if !failures.is_empty() {
            error!(
                index = %target,
                failed = failures.len(),
                first = %failures[0],
                "Bulk index had failures"
            );
            return Err(SearchIndexError::bulk_operation(format!(
                "{} of {} documents failed: {}",
                failures.len(),
                batch.len(),
                failures.join("; ")
            )));
        }

        debug!(index = %target, count = batch.len(), "Bulk indexed documents");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reindexer_shared::{ContentField, ContentRef};

    fn record(id: i64) -> ContentRecord {
        ContentRecord::new(ContentRef::new(id, 2), 16, format!("Folder {}", id))
            .with_field(ContentField::new("name", "eng-GB", format!("Folder {}", id)))
    }

    #[test]
    fn test_document() {
        let indexed_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let doc = document(&record(5), indexed_at);

        assert_eq!(doc["content_id"], 5);
        assert_eq!(doc["version"], 2);
        assert_eq!(doc["name"], "Folder 5");
        assert_eq!(doc["fields"][0]["identifier"], "name");
        assert_eq!(doc["indexed_at"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_bulk_body_pairs_actions_and_documents() {
        let batch = IndexBatch::from(vec![record(1), record(2)]);

        let body = bulk_body(&batch, Utc::now());

        assert_eq!(body.len(), 4);
    }

    #[test]
    fn test_bulk_failures_none() {
        let response = json!({
            "took": 3,
            "errors": false,
            "items": [{ "index": { "_id": "1", "status": 201 } }]
        });

        assert!(bulk_failures(&response).is_empty());
    }

    #[test]
    fn test_bulk_failures_reports_failed_items() {
        let response = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "1", "status": 201 } },
                { "index": {
                    "_id": "2",
                    "status": 400,
                    "error": { "type": "mapper_parsing_exception", "reason": "failed to parse field [published]" }
                } },
                { "index": { "_id": "3", "status": 429, "error": { "type": "es_rejected_execution_exception" } } }
            ]
        });

        let failures = bulk_failures(&response);

        assert_eq!(
            failures,
            vec![
                "2: failed to parse field [published]".to_string(),
                "3: es_rejected_execution_exception".to_string(),
            ]
        );
    }

    #[test]
    fn test_alias_swap_actions() {
        let previous = vec!["content-20240101000000-aaaaaaaa".to_string()];

        let body = alias_swap_actions("content", &previous, "content-20240102000000-bbbbbbbb");

        let actions = body["actions"].as_array().unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0]["remove"]["index"], "content-20240101000000-aaaaaaaa");
        assert_eq!(actions[1]["add"]["index"], "content-20240102000000-bbbbbbbb");
        assert_eq!(actions[1]["add"]["alias"], "content");
    }

    #[test]
    fn test_alias_swap_actions_first_generation() {
        let body = alias_swap_actions("content", &[], "content-20240102000000-bbbbbbbb");

        assert_eq!(body["actions"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_stale_generations_include_unaliased_leftovers() {
        let config = IndexConfig::new("content");
        let indices = vec![
            "content-20240103000000-cccccccc".to_string(),
            // replaced live generation
            "content-20240101000000-aaaaaaaa".to_string(),
            // staged by a pass that never published
            "content-20240102000000-bbbbbbbb".to_string(),
            "content-archive".to_string(),
        ];

        let stale = stale_generations(&config, indices, "content-20240103000000-cccccccc");

        assert_eq!(
            stale,
            vec![
                "content-20240101000000-aaaaaaaa".to_string(),
                "content-20240102000000-bbbbbbbb".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_suppressed_bulk_without_purge_is_rejected() {
        let writer = OpenSearchIndexWriter::new(
            "http://localhost:9200",
            IndexConfig::default(),
            SearchIndexConfig::default(),
        )
        .await
        .unwrap();

        writer.set_commit_suppressed(true).await.unwrap();
        let result = writer.bulk_index(&IndexBatch::from(vec![record(1)])).await;

        assert!(matches!(result, Err(SearchIndexError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected_before_any_request() {
        let writer = OpenSearchIndexWriter::new(
            "http://localhost:9200",
            IndexConfig::default(),
            SearchIndexConfig::with_max_batch_size(1),
        )
        .await
        .unwrap();

        let result = writer
            .bulk_index(&IndexBatch::from(vec![record(1), record(2)]))
            .await;

        assert!(matches!(
            result,
            Err(SearchIndexError::BatchSizeExceeded { provided: 2, max: 1 })
        ));
    }
}

//! Dependency initialization and wiring for the reindexer.

use std::sync::Arc;
use tracing::info;

use crate::{IndexingError, Settings};
use reindexer_pipeline::{BroadcastPublisher, ReindexOrchestrator};
use reindexer_repository::opensearch::IndexConfig;
use reindexer_repository::{OpenSearchIndexWriter, SqlContentStore};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: ReindexOrchestrator,
    /// Publisher the orchestrator reports pass events to.
    pub events: Arc<BroadcastPublisher>,
    /// The content store, kept to close its pool on shutdown.
    pub store: Arc<SqlContentStore>,
}

impl Dependencies {
    /// Initialize all dependencies from `settings`.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If initialization fails
    pub async fn new(settings: &Settings) -> Result<Self, IndexingError> {
        info!(
            database_url = %settings.database_url,
            opensearch_url = %settings.opensearch_url,
            alias = %settings.index_alias,
            "Initializing dependencies"
        );

        // Content store
        let store = Arc::new(SqlContentStore::connect(&settings.database_url).await?);
        info!("Content store connected");

        // Search index writer
        let writer = OpenSearchIndexWriter::new(
            &settings.opensearch_url,
            IndexConfig::new(settings.index_alias.clone()),
            settings.search_index_config(),
        )
        .await?;

        let healthy = writer.health_check().await?;
        if !healthy {
            return Err(IndexingError::config("OpenSearch cluster is unhealthy"));
        }
        writer.ensure_index_exists().await?;

        info!("OpenSearch connection verified");

        let events = Arc::new(BroadcastPublisher::default());

        let orchestrator = ReindexOrchestrator::with_config(
            store.clone(),
            store.clone(),
            Arc::new(writer),
            settings.orchestrator.clone(),
        )?
        .with_publisher(events.clone());

        Ok(Self {
            orchestrator,
            events,
            store,
        })
    }
}

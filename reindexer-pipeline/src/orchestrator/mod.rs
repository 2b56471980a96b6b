//! Orchestrator module for the reindex pipeline.
//!
//! Coordinates the content store, the source stream, and the index writer
//! into one all-or-nothing rebuild pass.

mod state;

pub use state::PassState;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::errors::ReindexError;
use crate::events::{EventPublisher, NoopPublisher};
use crate::ingest::{BatchIngester, IngestConfig};
use crate::source::{resolve_all, SourceItem};
use reindexer_repository::{ContentLoader, ContentStoreReader, IndexWriter};
use reindexer_shared::{ReindexEvent, ReindexSummary};

/// Configuration for the orchestrator.
///
/// Owned by the caller and handed to the orchestrator at construction.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of records per `bulk_index` call.
    pub chunk_size: usize,
    /// Maximum number of content loads in flight.
    pub load_concurrency: usize,
    /// Maximum number of retry attempts for a failed bulk call.
    pub max_retries: u32,
    /// Delay before the first bulk retry.
    pub initial_retry_delay: Duration,
    /// Upper bound for the bulk retry backoff.
    pub max_retry_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            load_concurrency: 8,
            max_retries: 3,
            initial_retry_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_secs(5),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_load_concurrency(mut self, load_concurrency: usize) -> Self {
        self.load_concurrency = load_concurrency;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Check that the configuration can drive a pass.
    pub fn validate(&self) -> Result<(), ReindexError> {
        if self.chunk_size == 0 {
            return Err(ReindexError::config("chunk_size must be greater than 0"));
        }
        if self.load_concurrency == 0 {
            return Err(ReindexError::config("load_concurrency must be greater than 0"));
        }
        if self.initial_retry_delay > self.max_retry_delay {
            return Err(ReindexError::config(
                "initial_retry_delay must not exceed max_retry_delay",
            ));
        }
        Ok(())
    }

    fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            chunk_size: self.chunk_size,
            max_retries: self.max_retries,
            initial_retry_delay: self.initial_retry_delay,
            max_retry_delay: self.max_retry_delay,
        }
    }
}

/// Orchestrator that rebuilds the search index from the content store.
///
/// The orchestrator:
/// - Streams refs from the reader and resolves them through the loader
/// - Suppresses commit and purges before the first chunk is ingested
/// - Ingests records in chunks and publishes them with a single commit
/// - Allows at most one pass at a time
/// - Reports the pass through its state channel and the event publisher
pub struct ReindexOrchestrator {
    reader: Arc<dyn ContentStoreReader>,
    loader: Arc<dyn ContentLoader>,
    writer: Arc<dyn IndexWriter>,
    publisher: Arc<dyn EventPublisher>,
    config: OrchestratorConfig,
    pass_lock: Mutex<()>,
    state_tx: watch::Sender<PassState>,
}

impl ReindexOrchestrator {
    /// Create a new orchestrator with the given components and default configuration.
    pub fn new(
        reader: Arc<dyn ContentStoreReader>,
        loader: Arc<dyn ContentLoader>,
        writer: Arc<dyn IndexWriter>,
    ) -> Self {
        let (state_tx, _) = watch::channel(PassState::Idle);

        Self {
            reader,
            loader,
            writer,
            publisher: Arc::new(NoopPublisher),
            config: OrchestratorConfig::default(),
            pass_lock: Mutex::new(()),
            state_tx,
        }
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        reader: Arc<dyn ContentStoreReader>,
        loader: Arc<dyn ContentLoader>,
        writer: Arc<dyn IndexWriter>,
        config: OrchestratorConfig,
    ) -> Result<Self, ReindexError> {
        config.validate()?;

        let mut orchestrator = Self::new(reader, loader, writer);
        orchestrator.config = config;
        Ok(orchestrator)
    }

    /// Publish pass events through `publisher`.
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Current state of the latest pass.
    pub fn state(&self) -> PassState {
        *self.state_tx.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<PassState> {
        self.state_tx.subscribe()
    }

    /// Rebuild the index from every published content item.
    ///
    /// Either the new generation becomes fully visible, or the pass fails
    /// and readers keep seeing the previous one.
    ///
    /// # Returns
    ///
    /// * `Ok(ReindexSummary)` - Counts of indexed and skipped content
    /// * `Err(ReindexError::PassAlreadyRunning)` - If another pass holds the lock
    /// * `Err(ReindexError)` - If the pass aborted on a fatal error
    #[instrument(skip(self))]
    pub async fn reindex_all(&self) -> Result<ReindexSummary, ReindexError> {
        let _guard = self.pass_lock.try_lock().map_err(|_| {
            warn!("Rejecting reindex request, a pass is already running");
            ReindexError::PassAlreadyRunning
        })?;

        let pass_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(
            pass_id = %pass_id,
            chunk_size = self.config.chunk_size,
            load_concurrency = self.config.load_concurrency,
            "Starting reindex pass"
        );
        self.publisher.publish(ReindexEvent::Started {
            pass_id,
            at: started_at,
        });

        match self.run_pass(pass_id, started_at).await {
            Ok(summary) => {
                self.transition(PassState::Done);
                info!(
                    pass_id = %pass_id,
                    indexed = summary.indexed,
                    skipped = summary.skipped,
                    batches = summary.batches,
                    duration_ms = summary.duration().num_milliseconds(),
                    "Reindex pass complete"
                );
                self.publisher.publish(ReindexEvent::Completed {
                    pass_id,
                    indexed: summary.indexed,
                    skipped: summary.skipped,
                    at: summary.finished_at,
                });
                Ok(summary)
            }
            Err(e) => {
                let stage = e.stage().unwrap_or_else(|| self.state());
                self.transition(PassState::Aborted);
                error!(
                    pass_id = %pass_id,
                    stage = %stage,
                    commit_suppressed = stage.has_mutated_index(),
                    error = %e,
                    "Reindex pass aborted, previous index generation remains visible"
                );
                self.publisher.publish(ReindexEvent::Aborted {
                    pass_id,
                    stage: stage.to_string(),
                    reason: e.to_string(),
                    at: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn run_pass(
        &self,
        pass_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<ReindexSummary, ReindexError> {
        self.transition(PassState::Listing);
        let mut source = resolve_all(
            self.reader.as_ref(),
            self.loader.as_ref(),
            self.config.load_concurrency,
        );
        self.transition(PassState::Loading);

        let mut ingester = BatchIngester::new(self.writer.as_ref(), self.config.ingest_config());
        let mut skipped_refs = Vec::new();
        let mut purged = false;

        while let Some(item) = source.next().await {
            let item = item.map_err(|e| {
                if purged {
                    e.with_stage(PassState::Ingesting)
                } else {
                    e
                }
            })?;

            match item {
                SourceItem::Loaded(record) => ingester.push(record),
                SourceItem::Missing(content_ref) => skipped_refs.push(content_ref),
            }

            if ingester.is_full() {
                if !purged {
                    self.begin_generation().await?;
                    purged = true;
                }
                ingester
                    .flush()
                    .await
                    .map_err(|e| ReindexError::index_write(PassState::Ingesting, e))?;
            }
        }

        // An empty or small store still replaces the previous generation.
        if !purged {
            self.begin_generation().await?;
        }
        ingester
            .flush()
            .await
            .map_err(|e| ReindexError::index_write(PassState::Ingesting, e))?;

        self.transition(PassState::Committing);
        self.writer
            .set_commit_suppressed(false)
            .await
            .map_err(|e| ReindexError::index_write(PassState::Committing, e))?;

        Ok(ReindexSummary {
            pass_id,
            indexed: ingester.indexed(),
            skipped: skipped_refs.len(),
            skipped_refs,
            batches: ingester.batches(),
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Suppress commit and purge, starting a new, invisible generation.
    async fn begin_generation(&self) -> Result<(), ReindexError> {
        self.transition(PassState::Purging);
        self.writer
            .set_commit_suppressed(true)
            .await
            .map_err(|e| ReindexError::index_write(PassState::Purging, e))?;
        self.writer
            .purge_index()
            .await
            .map_err(|e| ReindexError::index_write(PassState::Purging, e))?;
        self.transition(PassState::Ingesting);
        Ok(())
    }

    fn transition(&self, next: PassState) {
        let previous = self.state_tx.send_replace(next);
        debug!(from = %previous, to = %next, "Pass state transition");
    }
}

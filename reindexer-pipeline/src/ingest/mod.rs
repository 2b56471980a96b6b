//! Ingest module for the reindex pipeline.
//!
//! Batches resolved records and submits them to the index writer.

use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use reindexer_repository::{IndexWriter, SearchIndexError};
use reindexer_shared::{ContentRecord, IndexBatch};

/// Configuration for the batch ingester.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Number of records per `bulk_index` call.
    pub chunk_size: usize,
    /// Maximum number of retry attempts for a failed bulk call.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_retry_delay: Duration,
    /// Upper bound for the exponential backoff.
    pub max_retry_delay: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            max_retries: 3,
            initial_retry_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_secs(5),
        }
    }
}

/// Ingester that submits records to the index writer in chunks.
///
/// The ingester is responsible for:
/// - Batching records into chunks of `chunk_size`
/// - Retrying transient writer failures with exponential backoff
/// - Counting what was submitted
///
/// It never touches commit state; that is the orchestrator's job.
pub struct BatchIngester<'a> {
    writer: &'a dyn IndexWriter,
    config: IngestConfig,
    pending: IndexBatch,
    indexed: usize,
    batches: usize,
}

impl<'a> BatchIngester<'a> {
    /// Create a new ingester writing through `writer`.
    pub fn new(writer: &'a dyn IndexWriter, config: IngestConfig) -> Self {
        let pending = IndexBatch::with_capacity(config.chunk_size);
        Self {
            writer,
            config,
            pending,
            indexed: 0,
            batches: 0,
        }
    }

    /// Queue a record for the next chunk.
    pub fn push(&mut self, record: ContentRecord) {
        self.pending.push(record);
    }

    /// Whether the pending chunk has reached `chunk_size`.
    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.config.chunk_size
    }

    /// Number of queued, not yet submitted records.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of records accepted by the writer so far.
    pub fn indexed(&self) -> usize {
        self.indexed
    }

    /// Number of `bulk_index` calls that succeeded so far.
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Submit all pending records as one chunk.
    ///
    /// On failure the chunk is dropped; the pass is expected to abort.
    #[instrument(skip(self), fields(count = self.pending.len()))]
    pub async fn flush(&mut self) -> Result<(), SearchIndexError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let batch = self.pending.take();
        let count = batch.len();

        debug!(count = count, "Flushing records to search index");
        self.bulk_index_with_retry(&batch).await?;

        self.indexed += count;
        self.batches += 1;
        debug!(
            count = count,
            indexed = self.indexed,
            "Successfully indexed records"
        );
        Ok(())
    }

    /// Index a batch with exponential backoff retry logic.
    ///
    /// `bulk_index` upserts by document id, so resubmitting a batch that
    /// partially landed is harmless.
    async fn bulk_index_with_retry(&self, batch: &IndexBatch) -> Result<(), SearchIndexError> {
        let mut delay = self.config.initial_retry_delay;
        let mut attempt = 0;

        loop {
            match self.writer.bulk_index(batch).await {
                Ok(()) => {
                    if attempt > 0 {
                        info!(
                            attempt = attempt,
                            count = batch.len(),
                            "Bulk index succeeded after retry"
                        );
                    }
                    return Ok(());
                }
                Err(e) if !e.is_retryable() => {
                    debug!(error = %e, "Non-retryable error encountered");
                    return Err(e);
                }
                Err(e) if attempt >= self.config.max_retries => {
                    warn!(
                        attempts = attempt + 1,
                        error = %e,
                        "Bulk index failed, retries exhausted"
                    );
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    warn!(
                        attempt = attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Bulk index failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.config.max_retry_delay);
                }
            }
        }
    }
}

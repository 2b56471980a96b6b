//! Reindexer entry point.
//!
//! Runs a single reindex pass and exits non-zero if it does not complete.

use std::process::ExitCode;

use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use reindexer::config::LogFormat;
use reindexer::{Dependencies, IndexingError, Settings};
use reindexer_pipeline::BroadcastPublisher;
use reindexer_shared::ReindexEvent;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Forward pass events to the log as JSON lines.
fn spawn_event_logger(events: &BroadcastPublisher) -> tokio::task::JoinHandle<()> {
    let mut rx = events.subscribe();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let payload = serde_json::to_string(&event).unwrap_or_default();
                    match event {
                        ReindexEvent::Aborted { .. } => warn!(event = %payload, "Reindex event"),
                        _ => info!(event = %payload, "Reindex event"),
                    }
                }
                Err(RecvError::Lagged(missed)) => warn!(missed = missed, "Event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn run(settings: Settings) -> Result<(), IndexingError> {
    let deps = Dependencies::new(&settings).await?;
    let logger = spawn_event_logger(&deps.events);

    let result = tokio::select! {
        result = deps.orchestrator.reindex_all() => result.map_err(IndexingError::from),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            warn!("Interrupted, the previous index generation stays visible until the next pass");
            Err(IndexingError::Interrupted)
        }
    };

    deps.store.close().await;
    drop(deps);
    if let Err(e) = logger.await {
        error!(error = %e, "Event logger task failed");
    }

    let summary = result?;
    info!(
        pass_id = %summary.pass_id,
        indexed = summary.indexed,
        skipped = summary.skipped,
        batches = summary.batches,
        started_at = %summary.started_at.to_rfc3339(),
        finished_at = %summary.finished_at.to_rfc3339(),
        "Reindex finished"
    );
    for content_ref in &summary.skipped_refs {
        info!(content = %content_ref, "Skipped content that disappeared during the pass");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(settings.log_format);

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Reindex failed");
            ExitCode::FAILURE
        }
    }
}

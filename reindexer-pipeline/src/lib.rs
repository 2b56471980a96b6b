//! # Reindexer Pipeline
//!
//! This crate rebuilds a search index from the content store in a single,
//! all-or-nothing pass.
//!
//! ## Architecture
//!
//! The pipeline follows a Source-Ingest pattern under an orchestrator:
//!
//! 1. **Source**: Lists content refs and resolves them into records
//! 2. **Ingest**: Batches records and submits them to the index writer
//! 3. **Orchestrator**: Drives commit control and the pass state machine
//! 4. **Events**: Publishes pass lifecycle notifications

pub mod errors;
pub mod events;
pub mod ingest;
pub mod orchestrator;
pub mod source;

pub use errors::ReindexError;
pub use events::{BroadcastPublisher, EventPublisher, NoopPublisher};
pub use orchestrator::{OrchestratorConfig, PassState, ReindexOrchestrator};

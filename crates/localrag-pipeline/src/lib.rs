//! localrag-pipeline
//!
//! Wires chunker, embedder, vector index and answer composer into one
//! ingest-then-query pipeline. External model calls go through
//! [`guard`] decorators that bound them in time and retry transient failures
//! once.

pub mod guard;
pub mod orchestrator;
pub mod retriever;

pub use guard::{CallPolicy, GuardedEmbedder, GuardedGenerator};
pub use orchestrator::{IngestMode, IngestReport, Phase, Pipeline, PipelineStats, QueryOutcome};
pub use retriever::Retriever;

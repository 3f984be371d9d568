use std::time::Duration;

use thiserror::Error;

/// Failure taxonomy shared by every stage of the pipeline.
///
/// Only `Embedding` and `Generation` errors flagged `transient` are ever
/// retried; everything else surfaces to the caller on the first occurrence.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Embedding failed: {message}")]
    Embedding { message: String, transient: bool },

    #[error("Generation failed: {message}")]
    Generation { message: String, transient: bool },

    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: &'static str, after: Duration },

    #[error("Pipeline not ready: {0}")]
    NotReady(String),

    #[error("Document source failed: {0}")]
    Source(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self { Self::Config(msg.into()) }

    pub fn embedding(msg: impl Into<String>, transient: bool) -> Self {
        Self::Embedding { message: msg.into(), transient }
    }

    pub fn generation(msg: impl Into<String>, transient: bool) -> Self {
        Self::Generation { message: msg.into(), transient }
    }

    /// Whether an HTTP status from a model server is worth retrying.
    pub fn is_transient_status(status: u16) -> bool { status == 408 || status == 429 || status >= 500 }

    /// True for transport-level backend failures that may succeed on a second attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Embedding { transient: true, .. } | Self::Generation { transient: true, .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

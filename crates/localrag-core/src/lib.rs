//! localrag-core
//!
//! Shared vocabulary of the retrieval pipeline: document and chunk types, the
//! error taxonomy, the `Embedder`/`Generator` capability traits, layered
//! configuration, the chunker and the directory document source.

pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
pub mod traits;
pub mod types;

pub use chunker::{Chunker, ChunkingConfig};
pub use config::{Config, Settings};
pub use error::{Error, Result};
pub use loader::DirectoryLoader;
pub use traits::{Embedder, Generator};
pub use types::{Chunk, ChunkId, Document, Embedding, RetrievalResult, ScoredChunk, SourceMeta};

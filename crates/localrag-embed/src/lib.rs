//! localrag-embed
//!
//! Embedding backends behind the `Embedder` capability trait: a deterministic
//! feature-hashing embedder, an Ollama HTTP client and, with the `bert`
//! feature, a local sentence-transformers model run with candle.

pub mod hash;
pub mod ollama;
#[cfg(feature = "bert")]
pub mod bert;

use std::sync::Arc;

use tracing::info;

use localrag_core::config::{EmbeddingBackend, EmbeddingSettings};
use localrag_core::error::Result;
use localrag_core::traits::Embedder;

pub use hash::HashEmbedder;
pub use ollama::OllamaEmbedder;

/// Build the embedder selected by `embedding.backend`.
pub fn embedder_from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match settings.backend {
        EmbeddingBackend::Hash => Arc::new(HashEmbedder::new(settings.dimension)),
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(&settings.base_url, &settings.model)?),
        EmbeddingBackend::Bert => load_bert(settings)?,
    };
    info!(embedder = embedder.id(), "embedding backend ready");
    Ok(embedder)
}

#[cfg(feature = "bert")]
fn load_bert(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(bert::BertEmbedder::load(&settings.model_dir(), settings.max_tokens)?))
}

#[cfg(not(feature = "bert"))]
fn load_bert(_settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    Err(localrag_core::error::Error::config(
        "embedding.backend = \"bert\" needs localrag-embed built with the `bert` feature",
    ))
}

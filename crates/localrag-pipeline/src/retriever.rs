use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use localrag_core::error::{Error, Result};
use localrag_core::traits::Embedder;
use localrag_core::types::RetrievalResult;
use localrag_vector::VectorIndex;

/// Query-side half of the pipeline: embed the query, search the shared index.
/// Only ever takes the read lock.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<RwLock<VectorIndex>>,
    default_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<RwLock<VectorIndex>>, default_k: usize) -> Self {
        Self { embedder, index, default_k }
    }

    pub fn default_k(&self) -> usize { self.default_k }

    /// Top `k` chunks for `query` (`default_k` when `None`). An empty index
    /// yields an empty result without calling the embedder.
    pub async fn retrieve(&self, query: &str, k: Option<usize>) -> Result<RetrievalResult> {
        let k = k.unwrap_or(self.default_k);
        if k == 0 {
            return Err(Error::config("k must be greater than 0"));
        }
        if self.index.read().is_empty() {
            debug!("index is empty, skipping query embedding");
            return Ok(RetrievalResult::empty());
        }
        let query_vec = self.embedder.embed(query).await?;
        let result = self.index.read().search(&query_vec, k)?;
        debug!(k, hits = result.len(), top = ?result.top().map(|h| h.score), "retrieved");
        Ok(result)
    }
}

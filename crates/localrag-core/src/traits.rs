use async_trait::async_trait;

use crate::error::Result;
use crate::types::Embedding;

/// Text → vector capability. Backends must return vectors of one fixed
/// dimension for a given `id()`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the backend/model (e.g. `ollama:all-minilm`).
    fn id(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Order-preserving batch form. The default embeds one text at a time.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Prompt → answer capability.
#[async_trait]
pub trait Generator: Send + Sync {
    fn id(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String>;
}

//! Deterministic feature-hashing embedder.
//!
//! Lower-cased alphanumeric tokens are hashed with xxHash64 into `dim`
//! buckets as term counts, then L2-normalized. Texts sharing words get a
//! positive cosine similarity, which is enough for tests and offline use.

use std::hash::Hasher;

use async_trait::async_trait;
use twox_hash::XxHash64;

use localrag_core::error::Result;
use localrag_core::traits::Embedder;
use localrag_core::types::Embedding;

pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, id: format!("hash:d{}", dim) } }

    pub fn dim(&self) -> usize { self.dim }

    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut v = vec![0f32; self.dim];
        if self.dim == 0 {
            return Embedding::from(v);
        }
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.to_lowercase().as_bytes());
            let idx = (hasher.finish() % self.dim as u64) as usize;
            v[idx] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v { *x /= norm; }
        }
        Embedding::from(v)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn id(&self) -> &str { &self.id }

    async fn embed(&self, text: &str) -> Result<Embedding> { Ok(self.embed_text(text)) }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

//! Ollama embedding backend (`POST /api/embed`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use localrag_core::error::{Error, Result};
use localrag_core::traits::Embedder;
use localrag_core::types::Embedding;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
}

pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    id: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::config(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            url: format!("{}/api/embed", base_url.trim_end_matches('/')),
            model: model.to_string(),
            id: format!("ollama:{}", model),
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { model: &self.model, input: texts })
            .send()
            .await
            .map_err(|e| Error::embedding(format!("{}: {}", self.url, e), true))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::embedding(
                format!("{} returned {}: {}", self.url, status, body.trim()),
                Error::is_transient_status(status.as_u16()),
            ));
        }
        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("malformed response: {}", e), false))?;
        debug!(model = %self.model, batch = texts.len(), "embedded batch");
        validate_batch(body.embeddings, texts.len())
    }
}

/// Reject responses that do not carry exactly one non-empty vector per input,
/// all of the same dimension.
pub fn validate_batch(vectors: Vec<Vec<f32>>, expected: usize) -> Result<Vec<Embedding>> {
    if vectors.len() != expected {
        return Err(Error::embedding(
            format!("backend returned {} vectors for {} inputs", vectors.len(), expected),
            false,
        ));
    }
    let dim = vectors.first().map(Vec::len).unwrap_or_default();
    if vectors.iter().any(|v| v.is_empty() || v.len() != dim) {
        return Err(Error::embedding("backend returned empty or ragged vectors", false));
    }
    Ok(vectors.into_iter().map(Embedding::from).collect())
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn id(&self) -> &str { &self.id }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut out = self.request(&[text.to_string()]).await?;
        out.pop().ok_or_else(|| Error::embedding("backend returned no vector", false))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}

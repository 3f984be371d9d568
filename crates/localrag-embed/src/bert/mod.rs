//! Local sentence-transformers embedder (e.g. all-MiniLM-L6-v2) run with candle.
//!
//! Expects a model directory with `config.json`, `tokenizer.json` and
//! `model.safetensors`. Inference is CPU/GPU bound, so it runs on the blocking
//! thread pool to keep the async runtime responsive.

mod device;
mod pool;
mod tokenize;

use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;
use tracing::info;

use localrag_core::error::{Error, Result};
use localrag_core::traits::Embedder;
use localrag_core::types::Embedding;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_on_device;

struct BertInner {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

impl BertInner {
    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let row: Tensor = pooled.to_device(&Device::Cpu)?.squeeze(0)?;
        Ok(row.to_vec1()?)
    }
}

pub struct BertEmbedder {
    inner: Arc<BertInner>,
    id: String,
}

impl BertEmbedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        Self::load_inner(model_dir, max_len)
            .map_err(|e| Error::config(format!("loading model from {}: {}", model_dir.display(), e)))
    }

    fn load_inner(model_dir: &Path, max_len: usize) -> anyhow::Result<Self> {
        let device = select_device();
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(model_dir.join("config.json"))?)?;
        let weights = model_dir.join("model.safetensors");
        // SAFETY: the weights file is memory-mapped read-only and not modified while loaded.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DTYPE, &device)? };
        let model = BertModel::load(vb, &config)?;
        let name = model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        info!(model = %name, hidden = config.hidden_size, "local embedding model loaded");
        Ok(Self {
            inner: Arc::new(BertInner { model, tokenizer, device, max_len }),
            id: format!("bert:{}", name),
        })
    }

    async fn run(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        let inner = Arc::clone(&self.inner);
        let vectors = tokio::task::spawn_blocking(move || {
            texts.iter().map(|t| inner.embed_one(t)).collect::<anyhow::Result<Vec<_>>>()
        })
        .await
        .map_err(|e| Error::embedding(format!("embedding task failed: {}", e), false))?
        .map_err(|e| Error::embedding(e.to_string(), false))?;
        Ok(vectors.into_iter().map(Embedding::from).collect())
    }
}

#[async_trait]
impl Embedder for BertEmbedder {
    fn id(&self) -> &str { &self.id }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut out = self.run(vec![text.to_string()]).await?;
        out.pop().ok_or_else(|| Error::embedding("model produced no vector", false))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Embedding>> { self.run(texts.to_vec()).await }
}

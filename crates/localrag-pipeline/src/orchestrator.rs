//! Pipeline state machine.
//!
//! `Idle` until the first successful ingestion or snapshot load, `Ingesting`
//! while a pass runs, `Ready` afterwards. Queries are only served in `Ready`.
//! An ingestion pass computes every embedding before it takes the index
//! write lock, then applies the whole batch or nothing.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use localrag_answer::{generator_from_settings, AnswerComposer};
use localrag_core::chunker::Chunker;
use localrag_core::config::Settings;
use localrag_core::error::{Error, Result};
use localrag_core::traits::{Embedder, Generator};
use localrag_core::types::{Chunk, Document, Embedding, RetrievalResult};
use localrag_embed::embedder_from_settings;
use localrag_vector::{snapshot, SnapshotMeta, VectorIndex};

use crate::guard::{CallPolicy, GuardedEmbedder, GuardedGenerator};
use crate::retriever::Retriever;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Ingesting,
    Ready,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IngestMode {
    /// Add to the current index. A document already present is replaced
    /// as a whole, so chunks it no longer produces are dropped.
    #[default]
    Append,
    /// Swap the current index for one holding only this pass.
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub index_size: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub answer: String,
    pub retrieval: RetrievalResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    pub phase: Phase,
    pub index_size: usize,
    pub dimension: Option<usize>,
    pub embedder: String,
    pub generator: String,
}

/// Puts the phase back to `restore` unless the pass committed.
struct PhaseGuard<'a> {
    phase: &'a Mutex<Phase>,
    restore: Phase,
    committed: bool,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            *self.phase.lock() = self.restore;
        }
    }
}

pub struct Pipeline {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    composer: AnswerComposer,
    index: Arc<RwLock<VectorIndex>>,
    phase: Mutex<Phase>,
    batch_size: usize,
    progress: bool,
}

impl Pipeline {
    /// Assemble a pipeline around the given backends. Both are wrapped in the
    /// timeout/retry policy from `settings.policy`.
    pub fn new(settings: &Settings, embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Result<Self> {
        settings.validate()?;
        let chunker = Chunker::new(settings.chunking)?;
        let embedder: Arc<dyn Embedder> =
            Arc::new(GuardedEmbedder::new(embedder, CallPolicy::embedding(&settings.policy)));
        let generator: Arc<dyn Generator> =
            Arc::new(GuardedGenerator::new(generator, CallPolicy::generation(&settings.policy)));
        let index = Arc::new(RwLock::new(VectorIndex::new()));
        Ok(Self {
            chunker,
            retriever: Retriever::new(embedder.clone(), index.clone(), settings.retrieval.k),
            composer: AnswerComposer::new(generator),
            embedder,
            index,
            phase: Mutex::new(Phase::Idle),
            batch_size: settings.embedding.batch_size,
            progress: settings.ingest.progress,
        })
    }

    /// Build backends from configuration and assemble the pipeline.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = embedder_from_settings(&settings.embedding)?;
        let generator = generator_from_settings(&settings.generation)?;
        Self::new(settings, embedder, generator)
    }

    /// Assemble a pipeline and restore its index from `path`.
    pub fn from_snapshot(
        settings: &Settings,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        path: &Path,
    ) -> Result<Self> {
        let pipeline = Self::new(settings, embedder, generator)?;
        pipeline.load_snapshot(path)?;
        Ok(pipeline)
    }

    pub fn phase(&self) -> Phase { *self.phase.lock() }

    pub fn stats(&self) -> PipelineStats {
        let index = self.index.read();
        PipelineStats {
            phase: self.phase(),
            index_size: index.size(),
            dimension: index.dimension(),
            embedder: self.embedder.id().to_string(),
            generator: self.composer.generator_id().to_string(),
        }
    }

    fn begin_ingest(&self) -> Result<PhaseGuard<'_>> {
        let mut phase = self.phase.lock();
        if *phase == Phase::Ingesting {
            return Err(Error::NotReady("an ingestion pass is already running".into()));
        }
        let restore = *phase;
        *phase = Phase::Ingesting;
        info!(from = ?restore, "ingestion started");
        Ok(PhaseGuard { phase: &self.phase, restore, committed: false })
    }

    /// Chunk, embed and index `documents`. The index is only touched once
    /// every chunk has an embedding; any failure leaves it and the phase as
    /// they were.
    pub async fn ingest<I>(&self, documents: I, mode: IngestMode) -> Result<IngestReport>
    where
        I: IntoIterator<Item = Result<Document>>,
    {
        let mut guard = self.begin_ingest()?;
        let started = Instant::now();

        let mut seen: HashSet<String> = HashSet::new();
        let mut chunks: Vec<Chunk> = Vec::new();
        for doc in documents {
            let doc = doc?;
            if !seen.insert(doc.id.clone()) {
                return Err(Error::Source(format!("duplicate document id '{}' in one ingestion pass", doc.id)));
            }
            let pieces = self.chunker.split(&doc);
            debug!(doc = %doc.id, chunks = pieces.len(), "chunked");
            chunks.extend(pieces);
        }

        let embeddings = self.embed_chunks(&chunks).await?;
        let chunk_count = chunks.len();
        let items: Vec<(Chunk, Embedding)> = chunks.into_iter().zip(embeddings).collect();

        let index_size = {
            let mut index = self.index.write();
            match mode {
                IngestMode::Append => {
                    index.upsert_documents(items)?;
                }
                IngestMode::Replace => {
                    let mut fresh = VectorIndex::new();
                    fresh.insert_batch(items)?;
                    *index = fresh;
                }
            }
            index.size()
        };

        *self.phase.lock() = Phase::Ready;
        guard.committed = true;
        let report = IngestReport { documents: seen.len(), chunks: chunk_count, index_size, elapsed: started.elapsed() };
        info!(
            documents = report.documents,
            chunks = report.chunks,
            index_size = report.index_size,
            mode = ?mode,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "ingestion complete"
        );
        Ok(report)
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Embedding>> {
        let pb = if self.progress { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message("embedding");

        let mut out = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = match self.embedder.embed_many(&texts).await {
                Ok(v) => v,
                Err(e) => {
                    pb.abandon_with_message("embedding failed");
                    return Err(e);
                }
            };
            debug!(batch = batch.len(), done = out.len() + vectors.len(), total = chunks.len(), "embedded batch");
            out.extend(vectors);
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("embedded");
        Ok(out)
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.phase() {
            Phase::Ready => Ok(()),
            Phase::Idle => Err(Error::NotReady("nothing has been ingested yet".into())),
            Phase::Ingesting => Err(Error::NotReady("ingestion in progress".into())),
        }
    }

    /// Retrieve, compose and generate. `k` falls back to `retrieval.k`.
    pub async fn ask(&self, text: &str, k: Option<usize>) -> Result<QueryOutcome> {
        self.ensure_ready()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::config("query text must not be empty"));
        }
        let retrieval = self.retriever.retrieve(text, k).await?;
        if retrieval.is_empty() {
            warn!("no context retrieved, answering ungrounded");
        }
        let prompt = self.composer.compose(text, &retrieval);
        let answer = self.composer.answer(&prompt).await?;
        Ok(QueryOutcome { answer, retrieval })
    }

    pub async fn query(&self, text: &str) -> Result<String> { Ok(self.ask(text, None).await?.answer) }

    pub async fn query_detailed(&self, text: &str) -> Result<QueryOutcome> { self.ask(text, None).await }

    pub fn save_snapshot(&self, path: &Path) -> Result<SnapshotMeta> {
        let index = self.index.read();
        snapshot::save(&index, self.embedder.id(), path)
    }

    /// Replace the index with the snapshot at `path`. Snapshots written by a
    /// different embedder are refused.
    pub fn load_snapshot(&self, path: &Path) -> Result<SnapshotMeta> {
        let mut guard = self.begin_ingest()?;
        let (loaded, meta) = snapshot::load(path)?;
        if meta.embedder_id != self.embedder.id() {
            return Err(Error::config(format!(
                "snapshot {} was built with embedder '{}', configured embedder is '{}'",
                path.display(),
                meta.embedder_id,
                self.embedder.id()
            )));
        }
        *self.index.write() = loaded;
        *self.phase.lock() = Phase::Ready;
        guard.committed = true;
        Ok(meta)
    }
}

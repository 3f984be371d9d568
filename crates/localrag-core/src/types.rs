//! Domain types shared by the chunker, index, retriever and composer.

use serde::{Deserialize, Serialize};
use std::ops::Range;

pub type ChunkId = String;

/// Where a document came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub path: String,
    /// Document type, usually the file extension (`txt`, `md`).
    pub kind: String,
}

/// A raw text blob produced by a document source. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub source: SourceMeta,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, source: SourceMeta) -> Self {
        Self { id: id.into(), text: text.into(), source }
    }
}

/// A retrievable segment of exactly one document.
///
/// - `id`: `"{doc_id}:{chunk_index}"`, unique across the corpus
/// - `doc_id`: back-reference to the parent `Document::id`
/// - `start`/`end`: char offsets of `text` inside the parent document
/// - `overlap`: number of leading chars shared with the previous chunk (0 for the first)
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub text: String,
    pub source: SourceMeta,
    pub start: usize,
    pub end: usize,
    pub overlap: usize,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

impl Chunk {
    pub fn offset_range(&self) -> Range<usize> { self.start..self.end }

    /// The part of `text` not already covered by the previous chunk.
    pub fn fresh_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((byte, _)) => &self.text[byte..],
            None => "",
        }
    }
}

/// A fixed-dimension vector produced by an embedder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn dim(&self) -> usize { self.0.len() }
    pub fn as_slice(&self) -> &[f32] { &self.0 }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn norm(&self) -> f32 { self.0.iter().map(|x| x * x).sum::<f32>().sqrt() }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self { Self(values) }
}

/// One ranked hit. `score` is cosine similarity in `[-1, 1]`; higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Ranked hits for one query, best first, at most `k` long.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn empty() -> Self { Self::default() }
    pub fn is_empty(&self) -> bool { self.hits.is_empty() }
    pub fn len(&self) -> usize { self.hits.len() }
    pub fn iter(&self) -> std::slice::Iter<'_, ScoredChunk> { self.hits.iter() }
    pub fn top(&self) -> Option<&ScoredChunk> { self.hits.first() }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a ScoredChunk;
    type IntoIter = std::slice::Iter<'a, ScoredChunk>;
    fn into_iter(self) -> Self::IntoIter { self.hits.iter() }
}

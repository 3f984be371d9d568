//! Exact in-memory vector index.
//!
//! Entries are kept in insertion order next to their precomputed norms.
//! Search scores every entry by cosine similarity and ranks by descending
//! score, breaking ties by insertion order so results are reproducible.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use localrag_core::error::{Error, Result};
use localrag_core::types::{Chunk, ChunkId, Embedding, RetrievalResult, ScoredChunk};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Embedding,
    pub insertion_order: u64,
}

#[derive(Debug, Default)]
pub struct VectorIndex {
    dim: Option<usize>,
    entries: Vec<IndexEntry>,
    norms: Vec<f32>,
    positions: HashMap<ChunkId, usize>,
    next_order: u64,
}

impl VectorIndex {
    pub fn new() -> Self { Self::default() }

    /// Rebuild an index from stored entries, restoring their insertion order.
    pub fn from_entries(mut entries: Vec<IndexEntry>) -> Result<Self> {
        entries.sort_by_key(|e| e.insertion_order);
        let mut index = Self::new();
        for entry in entries {
            index.check_dim(&entry.embedding)?;
            if index.positions.contains_key(&entry.chunk.id) {
                return Err(Error::Snapshot(format!("duplicate chunk id {}", entry.chunk.id)));
            }
            index.dim = Some(entry.embedding.dim());
            index.next_order = entry.insertion_order + 1;
            index.positions.insert(entry.chunk.id.clone(), index.entries.len());
            index.norms.push(entry.embedding.norm());
            index.entries.push(entry);
        }
        Ok(index)
    }

    pub fn size(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Fixed by the first insertion; `None` while the index has never held an entry.
    pub fn dimension(&self) -> Option<usize> { self.dim }

    pub fn get(&self, chunk_id: &str) -> Option<&IndexEntry> {
        self.positions.get(chunk_id).map(|&pos| &self.entries[pos])
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> { self.entries.iter() }

    /// Drop every entry and forget the dimension.
    pub fn clear(&mut self) { *self = Self::default(); }

    fn check_dim(&self, embedding: &Embedding) -> Result<()> {
        if embedding.is_empty() {
            return Err(Error::embedding("empty embedding", false));
        }
        match self.dim {
            Some(expected) if expected != embedding.dim() => {
                Err(Error::DimensionMismatch { expected, actual: embedding.dim() })
            }
            _ => Ok(()),
        }
    }

    /// Insert or replace the entry for `chunk.id`. A replaced entry keeps its
    /// original insertion order.
    pub fn insert(&mut self, chunk: Chunk, embedding: Embedding) -> Result<()> {
        self.check_dim(&embedding)?;
        self.dim = Some(embedding.dim());
        let norm = embedding.norm();
        match self.positions.get(&chunk.id) {
            Some(&pos) => {
                let entry = &mut self.entries[pos];
                entry.chunk = chunk;
                entry.embedding = embedding;
                self.norms[pos] = norm;
            }
            None => {
                self.positions.insert(chunk.id.clone(), self.entries.len());
                self.entries.push(IndexEntry { chunk, embedding, insertion_order: self.next_order });
                self.norms.push(norm);
                self.next_order += 1;
            }
        }
        Ok(())
    }

    fn check_batch(&self, items: &[(Chunk, Embedding)]) -> Result<()> {
        let expected = self.dim.or_else(|| items.first().map(|(_, e)| e.dim()));
        for (_, embedding) in items {
            if embedding.is_empty() {
                return Err(Error::embedding("empty embedding", false));
            }
            if let Some(expected) = expected {
                if embedding.dim() != expected {
                    return Err(Error::DimensionMismatch { expected, actual: embedding.dim() });
                }
            }
        }
        Ok(())
    }

    /// Insert every pair or none of them: all dimensions are checked before
    /// the index is touched. Returns the number of pairs applied.
    pub fn insert_batch(&mut self, items: Vec<(Chunk, Embedding)>) -> Result<usize> {
        self.check_batch(&items)?;
        let applied = items.len();
        for (chunk, embedding) in items {
            self.insert(chunk, embedding)?;
        }
        debug!(applied, size = self.size(), "batch inserted");
        Ok(applied)
    }

    /// Like `insert_batch`, but every document present in `items` ends up
    /// holding exactly the chunks given for it: chunks of those documents
    /// that are not in `items` are dropped. Surviving chunk ids keep their
    /// insertion order.
    pub fn upsert_documents(&mut self, items: Vec<(Chunk, Embedding)>) -> Result<usize> {
        self.check_batch(&items)?;
        let docs: HashSet<&str> = items.iter().map(|(c, _)| c.doc_id.as_str()).collect();
        let fresh: HashSet<&str> = items.iter().map(|(c, _)| c.id.as_str()).collect();
        let stale = self.retain(|e| !docs.contains(e.chunk.doc_id.as_str()) || fresh.contains(e.chunk.id.as_str()));
        let applied = items.len();
        for (chunk, embedding) in items {
            self.insert(chunk, embedding)?;
        }
        debug!(applied, stale, size = self.size(), "documents upserted");
        Ok(applied)
    }

    /// Drop every chunk of `doc_id`. Returns how many were removed.
    pub fn remove_document(&mut self, doc_id: &str) -> usize { self.retain(|e| e.chunk.doc_id != doc_id) }

    /// Keep entries matching `keep`, preserving order. The dimension stays
    /// fixed even if nothing is left.
    fn retain(&mut self, mut keep: impl FnMut(&IndexEntry) -> bool) -> usize {
        let before = self.entries.len();
        let mut kept_norms = Vec::with_capacity(before);
        let mut kept = Vec::with_capacity(before);
        for (entry, norm) in self.entries.drain(..).zip(self.norms.drain(..)) {
            if keep(&entry) {
                kept.push(entry);
                kept_norms.push(norm);
            }
        }
        self.entries = kept;
        self.norms = kept_norms;
        self.positions = self.entries.iter().enumerate().map(|(pos, e)| (e.chunk.id.clone(), pos)).collect();
        before - self.entries.len()
    }

    /// Up to `k` entries ranked by cosine similarity to `query`.
    pub fn search(&self, query: &Embedding, k: usize) -> Result<RetrievalResult> {
        let Some(dim) = self.dim else { return Ok(RetrievalResult::empty()) };
        if self.entries.is_empty() || k == 0 {
            return Ok(RetrievalResult::empty());
        }
        if query.dim() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: query.dim() });
        }

        let q_norm = query.norm();
        let mut scored: Vec<(f32, usize)> = self
            .entries
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(pos, (entry, &norm))| (cosine(query.as_slice(), q_norm, entry.embedding.as_slice(), norm), pos))
            .collect();

        let rank = |a: &(f32, usize), b: &(f32, usize)| -> Ordering {
            b.0.total_cmp(&a.0)
                .then_with(|| self.entries[a.1].insertion_order.cmp(&self.entries[b.1].insertion_order))
        };
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank);
            scored.truncate(k);
        }
        scored.sort_by(rank);

        let hits = scored
            .into_iter()
            .map(|(score, pos)| ScoredChunk { chunk: self.entries[pos].chunk.clone(), score })
            .collect();
        Ok(RetrievalResult { hits })
    }
}

/// Cosine similarity with precomputed norms; zero vectors score 0.
fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let score = dot / (a_norm * b_norm);
    if score.is_finite() { score } else { 0.0 }
}

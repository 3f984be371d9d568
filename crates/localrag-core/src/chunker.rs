//! Sliding-window chunker with structural-boundary preference.
//!
//! Windows are `chunk_size` chars long and the next window always starts
//! exactly `overlap` chars before the previous one ended. When a paragraph,
//! line, sentence or word boundary lies within `boundary_lookback` chars of
//! the window end, the chunk is cut there instead, which only shortens it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    pub boundary_lookback: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, overlap: 200, boundary_lookback: 100 }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self { chunk_size, overlap, ..Self::default() }
    }

    pub fn with_lookback(mut self, boundary_lookback: usize) -> Self {
        self.boundary_lookback = boundary_lookback;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than 0"));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARY_PRIORITY: [Boundary; 4] =
    [Boundary::Paragraph, Boundary::Line, Boundary::Sentence, Boundary::Word];

impl Boundary {
    /// Whether a chunk ending right before `chars[end]` ends on this kind of boundary.
    fn matches(self, chars: &[char], end: usize) -> bool {
        let last = chars[end - 1];
        match self {
            Boundary::Paragraph => end >= 2 && last == '\n' && chars[end - 2] == '\n',
            Boundary::Line => last == '\n',
            Boundary::Sentence => {
                end >= 2 && last.is_whitespace() && matches!(chars[end - 2], '.' | '!' | '?')
            }
            Boundary::Word => last.is_whitespace(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig { &self.config }

    /// Split one document into ordered, contiguous, overlapping chunks.
    /// An empty document yields no chunks.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let text = document.text.as_str();
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }
        // byte offset of every char position, plus the end of the string
        let byte_at: Vec<usize> = text
            .char_indices()
            .map(|(b, _)| b)
            .chain(std::iter::once(text.len()))
            .collect();

        let spans = self.windows(&chars);
        let total = spans.len();
        spans
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| Chunk {
                id: format!("{}:{}", document.id, index),
                doc_id: document.id.clone(),
                text: text[byte_at[start]..byte_at[end]].to_string(),
                source: document.source.clone(),
                start,
                end,
                overlap: if index == 0 { 0 } else { self.config.overlap },
                chunk_index: index,
                total_chunks: total,
            })
            .collect()
    }

    fn windows(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let n = chars.len();
        let mut spans = Vec::new();
        let mut start = 0;
        loop {
            let hard_end = (start + self.config.chunk_size).min(n);
            if hard_end == n {
                spans.push((start, n));
                return spans;
            }
            let end = self.cut_point(chars, start, hard_end);
            spans.push((start, end));
            start = end - self.config.overlap;
        }
    }

    fn cut_point(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        if self.config.boundary_lookback == 0 {
            return hard_end;
        }
        // the chunk must stay longer than the overlap or the next window would not advance
        let min_end = start + self.config.overlap + 1;
        let floor = hard_end.saturating_sub(self.config.boundary_lookback).max(min_end);
        if floor > hard_end {
            return hard_end;
        }
        BOUNDARY_PRIORITY
            .iter()
            .find_map(|kind| (floor..=hard_end).rev().find(|&end| kind.matches(chars, end)))
            .unwrap_or(hard_end)
    }
}

/// One-shot form of [`Chunker::split`] using the default boundary lookback.
pub fn split(document: &Document, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(ChunkingConfig::new(chunk_size, overlap))?.split(document))
}

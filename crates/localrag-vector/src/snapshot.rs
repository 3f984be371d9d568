//! JSON snapshot of a `VectorIndex`.
//!
//! The file records the embedder that produced the vectors, the index
//! dimension and a blake3 checksum over the entries. Writes go to a temp
//! file in the target directory and are renamed into place.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use localrag_core::error::{Error, Result};

use crate::index::{IndexEntry, VectorIndex};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub version: u32,
    pub embedder_id: String,
    pub dimension: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub checksum: String,
}

#[derive(Serialize)]
struct SnapshotOut<'a> {
    #[serde(flatten)]
    meta: &'a SnapshotMeta,
    entries: Vec<&'a IndexEntry>,
}

#[derive(Deserialize)]
struct SnapshotIn {
    #[serde(flatten)]
    meta: SnapshotMeta,
    entries: Vec<IndexEntry>,
}

fn checksum<'a>(entries: impl Iterator<Item = &'a IndexEntry>) -> String {
    let mut hasher = blake3::Hasher::new();
    for e in entries {
        let c = &e.chunk;
        for field in [&c.id, &c.doc_id, &c.text, &c.source.path, &c.source.kind] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        for n in [c.start, c.end, c.overlap, c.chunk_index, c.total_chunks] {
            hasher.update(&(n as u64).to_le_bytes());
        }
        hasher.update(&e.insertion_order.to_le_bytes());
        for x in e.embedding.as_slice() {
            hasher.update(&x.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

pub fn save(index: &VectorIndex, embedder_id: &str, path: &Path) -> Result<SnapshotMeta> {
    let meta = SnapshotMeta {
        version: SNAPSHOT_VERSION,
        embedder_id: embedder_id.to_string(),
        dimension: index.dimension(),
        created_at: Utc::now(),
        checksum: checksum(index.entries()),
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        let out = SnapshotOut { meta: &meta, entries: index.entries().collect() };
        serde_json::to_writer(&mut writer, &out).map_err(|e| Error::Snapshot(e.to_string()))?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    info!(path = %path.display(), entries = index.size(), "snapshot written");
    Ok(meta)
}

pub fn load(path: &Path) -> Result<(VectorIndex, SnapshotMeta)> {
    let file = fs::File::open(path)?;
    let snapshot: SnapshotIn = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::Snapshot(format!("{}: {}", path.display(), e)))?;
    let SnapshotIn { meta, entries } = snapshot;
    if meta.version != SNAPSHOT_VERSION {
        return Err(Error::Snapshot(format!("unsupported snapshot version {}", meta.version)));
    }
    if checksum(entries.iter()) != meta.checksum {
        return Err(Error::Snapshot(format!("checksum mismatch in {}", path.display())));
    }
    let index = VectorIndex::from_entries(entries)?;
    if index.dimension() != meta.dimension {
        return Err(Error::Snapshot(format!(
            "header dimension {:?} does not match entries {:?}",
            meta.dimension,
            index.dimension()
        )));
    }
    info!(path = %path.display(), entries = index.size(), embedder = %meta.embedder_id, "snapshot loaded");
    Ok((index, meta))
}

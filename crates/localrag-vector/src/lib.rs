//! localrag-vector
//!
//! Exact cosine-similarity index over chunk embeddings, plus a JSON snapshot
//! format so an ingested corpus can be reloaded without re-embedding.

pub mod index;
pub mod snapshot;

pub use index::{IndexEntry, VectorIndex};
pub use snapshot::{SnapshotMeta, SNAPSHOT_VERSION};

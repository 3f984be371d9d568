use std::fs;

use localrag_core::error::Error;
use localrag_core::types::{Chunk, Embedding, SourceMeta};
use localrag_vector::{snapshot, VectorIndex, SNAPSHOT_VERSION};
use tempfile::TempDir;

fn chunk(doc: &str, i: usize, text: &str) -> Chunk {
    Chunk {
        id: format!("{}:{}", doc, i),
        doc_id: doc.to_string(),
        text: text.to_string(),
        source: SourceMeta { path: format!("docs/{}.md", doc), kind: "md".into() },
        start: i * 10,
        end: i * 10 + text.chars().count(),
        overlap: if i == 0 { 0 } else { 2 },
        chunk_index: i,
        total_chunks: 3,
    }
}

fn sample_index() -> VectorIndex {
    let mut index = VectorIndex::new();
    index.insert(chunk("water", 0, "boil water for one minute"), Embedding::from(vec![0.9, 0.1, 0.0])).unwrap();
    index.insert(chunk("water", 1, "filter through cloth"), Embedding::from(vec![0.7, 0.3, 0.1])).unwrap();
    index.insert(chunk("fire", 0, "use dry tinder"), Embedding::from(vec![0.0, 0.2, 0.95])).unwrap();
    index.insert(chunk("tie", 0, "same vector as water:0"), Embedding::from(vec![0.9, 0.1, 0.0])).unwrap();
    index
}

#[test]
fn round_trip_preserves_entries_and_ranking() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("nested/dir/index.json");
    let index = sample_index();

    let meta = snapshot::save(&index, "hash:d3", &path).expect("save");
    assert_eq!(meta.version, SNAPSHOT_VERSION);
    assert_eq!(meta.dimension, Some(3));

    let (restored, loaded_meta) = snapshot::load(&path).expect("load");
    assert_eq!(loaded_meta, meta);
    assert_eq!(restored.size(), index.size());
    assert_eq!(restored.dimension(), Some(3));
    assert_eq!(restored.entries().collect::<Vec<_>>(), index.entries().collect::<Vec<_>>());

    let q = Embedding::from(vec![1.0, 0.0, 0.0]);
    assert_eq!(restored.search(&q, 4).unwrap(), index.search(&q, 4).unwrap());
    let top: Vec<_> = restored.search(&q, 2).unwrap().iter().map(|h| h.chunk.id.clone()).collect();
    assert_eq!(top, ["water:0", "tie:0"]);
}

#[test]
fn restored_index_keeps_assigning_fresh_orders() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("index.json");
    snapshot::save(&sample_index(), "hash:d3", &path).unwrap();
    let (mut restored, _) = snapshot::load(&path).unwrap();

    restored.insert(chunk("late", 0, "late arrival"), Embedding::from(vec![0.9, 0.1, 0.0])).unwrap();
    let late = restored.get("late:0").unwrap();
    assert!(restored.entries().all(|e| e.chunk.id == "late:0" || e.insertion_order < late.insertion_order));
}

#[test]
fn empty_index_round_trips() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("empty.json");
    let meta = snapshot::save(&VectorIndex::new(), "hash:d3", &path).unwrap();
    assert_eq!(meta.dimension, None);
    let (restored, _) = snapshot::load(&path).unwrap();
    assert!(restored.is_empty());
}

#[test]
fn tampered_snapshot_is_rejected() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("index.json");
    snapshot::save(&sample_index(), "hash:d3", &path).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    let tampered = raw.replacen("use dry tinder", "use wet tinder", 1);
    assert_ne!(raw, tampered);
    fs::write(&path, tampered).unwrap();

    let err = snapshot::load(&path).unwrap_err();
    assert!(matches!(err, Error::Snapshot(ref msg) if msg.contains("checksum")), "{err}");
}

#[test]
fn unknown_version_and_garbage_are_rejected() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("index.json");
    snapshot::save(&sample_index(), "hash:d3", &path).unwrap();

    let mut json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    json["version"] = serde_json::json!(99);
    fs::write(&path, json.to_string()).unwrap();
    assert!(matches!(snapshot::load(&path), Err(Error::Snapshot(_))));

    fs::write(&path, "not json").unwrap();
    assert!(matches!(snapshot::load(&path), Err(Error::Snapshot(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let tmp = TempDir::new().expect("tmp");
    assert!(matches!(snapshot::load(&tmp.path().join("nope.json")), Err(Error::Io(_))));
}

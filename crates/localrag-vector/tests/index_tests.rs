use approx::assert_relative_eq;
use localrag_core::error::Error;
use localrag_core::types::{Chunk, Embedding, SourceMeta};
use localrag_vector::VectorIndex;

fn chunk(id: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        doc_id: id.split(':').next().unwrap().to_string(),
        text: format!("text of {}", id),
        source: SourceMeta { path: format!("/tmp/{}.txt", id), kind: "txt".into() },
        start: 0,
        end: 10,
        overlap: 0,
        chunk_index: 0,
        total_chunks: 1,
    }
}

fn emb(v: &[f32]) -> Embedding { Embedding::from(v.to_vec()) }

fn ids(index: &VectorIndex, q: &[f32], k: usize) -> Vec<String> {
    index.search(&emb(q), k).expect("search").iter().map(|h| h.chunk.id.clone()).collect()
}

#[test]
fn first_insert_fixes_dimension() {
    let mut index = VectorIndex::new();
    assert_eq!(index.dimension(), None);
    index.insert(chunk("a:0"), emb(&[1.0, 0.0, 0.0])).unwrap();
    assert_eq!(index.dimension(), Some(3));

    let err = index.insert(chunk("b:0"), emb(&[1.0, 0.0])).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
    assert_eq!(index.size(), 1);
    assert!(index.get("b:0").is_none());
}

#[test]
fn reinserting_same_id_replaces_in_place() {
    let mut index = VectorIndex::new();
    index.insert(chunk("a:0"), emb(&[1.0, 0.0])).unwrap();
    index.insert(chunk("b:0"), emb(&[0.0, 1.0])).unwrap();
    index.insert(chunk("a:0"), emb(&[0.0, 1.0])).unwrap();
    assert_eq!(index.size(), 2);

    // a:0 keeps its original slot, so it still wins the tie against b:0
    let hits = index.search(&emb(&[0.0, 1.0]), 2).unwrap();
    assert_eq!(hits.hits[0].chunk.id, "a:0");
    assert_relative_eq!(hits.hits[0].score, hits.hits[1].score);
}

#[test]
fn ranks_by_cosine_descending() {
    let mut index = VectorIndex::new();
    index.insert(chunk("far:0"), emb(&[0.0, 1.0])).unwrap();
    index.insert(chunk("near:0"), emb(&[1.0, 0.1])).unwrap();
    index.insert(chunk("mid:0"), emb(&[1.0, 1.0])).unwrap();

    let result = index.search(&emb(&[1.0, 0.0]), 3).unwrap();
    let got: Vec<_> = result.iter().map(|h| h.chunk.id.as_str()).collect();
    assert_eq!(got, ["near:0", "mid:0", "far:0"]);
    assert_relative_eq!(result.hits[1].score, std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
    assert_relative_eq!(result.hits[2].score, 0.0, epsilon = 1e-6);
    assert!(result.iter().all(|h| (-1.0..=1.0 + 1e-6).contains(&h.score)));
}

#[test]
fn equal_scores_fall_back_to_insertion_order() {
    let mut index = VectorIndex::new();
    for id in ["c:0", "a:0", "b:0"] {
        index.insert(chunk(id), emb(&[2.0, 2.0])).unwrap();
    }
    assert_eq!(ids(&index, &[1.0, 1.0], 3), ["c:0", "a:0", "b:0"]);
    assert_eq!(ids(&index, &[1.0, 1.0], 2), ["c:0", "a:0"]);
}

#[test]
fn search_is_repeatable() {
    let mut index = VectorIndex::new();
    for i in 0..50 {
        let x = (i as f32 * 0.37).sin();
        index.insert(chunk(&format!("d:{}", i)), emb(&[x, 1.0 - x, 0.5])).unwrap();
    }
    let first = index.search(&emb(&[0.3, 0.7, 0.5]), 7).unwrap();
    for _ in 0..5 {
        assert_eq!(index.search(&emb(&[0.3, 0.7, 0.5]), 7).unwrap(), first);
    }
    assert_eq!(first.len(), 7);
}

#[test]
fn empty_index_and_oversized_k() {
    let mut index = VectorIndex::new();
    assert!(index.search(&emb(&[1.0]), 4).unwrap().is_empty());

    index.insert(chunk("a:0"), emb(&[1.0, 0.0])).unwrap();
    index.insert(chunk("b:0"), emb(&[0.5, 0.5])).unwrap();
    assert_eq!(index.search(&emb(&[1.0, 0.0]), 10).unwrap().len(), 2);
    assert!(index.search(&emb(&[1.0, 0.0]), 0).unwrap().is_empty());
}

#[test]
fn query_with_wrong_dimension_is_rejected() {
    let mut index = VectorIndex::new();
    index.insert(chunk("a:0"), emb(&[1.0, 0.0])).unwrap();
    let err = index.search(&emb(&[1.0, 0.0, 0.0]), 1).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
}

#[test]
fn zero_vectors_score_zero() {
    let mut index = VectorIndex::new();
    index.insert(chunk("z:0"), emb(&[0.0, 0.0])).unwrap();
    let hits = index.search(&emb(&[1.0, 0.0]), 1).unwrap();
    assert_eq!(hits.hits[0].score, 0.0);
    let hits = index.search(&emb(&[0.0, 0.0]), 1).unwrap();
    assert_eq!(hits.hits[0].score, 0.0);
}

#[test]
fn batch_insert_is_all_or_nothing() {
    let mut index = VectorIndex::new();
    index.insert(chunk("a:0"), emb(&[1.0, 0.0])).unwrap();

    let bad = vec![(chunk("b:0"), emb(&[0.0, 1.0])), (chunk("c:0"), emb(&[0.0, 1.0, 0.0]))];
    assert!(index.insert_batch(bad).is_err());
    assert_eq!(index.size(), 1);
    assert!(index.get("b:0").is_none());

    let good = vec![(chunk("b:0"), emb(&[0.0, 1.0])), (chunk("c:0"), emb(&[1.0, 1.0]))];
    assert_eq!(index.insert_batch(good).unwrap(), 2);
    assert_eq!(index.size(), 3);
}

#[test]
fn batch_into_empty_index_must_agree_with_itself() {
    let mut index = VectorIndex::new();
    let ragged = vec![(chunk("a:0"), emb(&[1.0, 0.0])), (chunk("b:0"), emb(&[1.0]))];
    assert!(index.insert_batch(ragged).is_err());
    assert!(index.is_empty());
    assert_eq!(index.dimension(), None);
}

#[test]
fn empty_embedding_is_rejected() {
    let mut index = VectorIndex::new();
    let err = index.insert(chunk("a:0"), emb(&[])).unwrap_err();
    assert!(matches!(err, Error::Embedding { transient: false, .. }));
    assert!(index.is_empty());
}

#[test]
fn clear_forgets_dimension() {
    let mut index = VectorIndex::new();
    index.insert(chunk("a:0"), emb(&[1.0, 0.0])).unwrap();
    index.clear();
    assert!(index.is_empty());
    assert_eq!(index.dimension(), None);
    index.insert(chunk("a:0"), emb(&[1.0, 0.0, 0.0])).unwrap();
    assert_eq!(index.dimension(), Some(3));
}

fn doc_chunk(doc: &str, i: usize, total: usize) -> Chunk {
    Chunk { doc_id: doc.to_string(), chunk_index: i, total_chunks: total, ..chunk(&format!("{}:{}", doc, i)) }
}

#[test]
fn upserting_a_shorter_document_drops_its_stale_chunks() {
    let mut index = VectorIndex::new();
    let long: Vec<_> = (0..3).map(|i| (doc_chunk("d", i, 3), emb(&[1.0, i as f32]))).collect();
    index.upsert_documents(long).unwrap();
    index.insert(doc_chunk("other", 0, 1), emb(&[0.0, 1.0])).unwrap();
    let d0_order = index.get("d:0").unwrap().insertion_order;

    index.upsert_documents(vec![(doc_chunk("d", 0, 1), emb(&[1.0, 0.5]))]).unwrap();
    assert_eq!(index.size(), 2);
    assert!(index.get("d:1").is_none() && index.get("d:2").is_none());
    assert_eq!(index.get("d:0").unwrap().chunk.total_chunks, 1);
    assert_eq!(index.get("d:0").unwrap().insertion_order, d0_order);
    assert!(index.get("other:0").is_some());
    assert_eq!(ids(&index, &[0.0, 1.0], 2), ["other:0", "d:0"]);
}

#[test]
fn failed_upsert_keeps_stale_chunks() {
    let mut index = VectorIndex::new();
    index.upsert_documents((0..3).map(|i| (doc_chunk("d", i, 3), emb(&[1.0, 0.0]))).collect()).unwrap();
    let err = index.upsert_documents(vec![(doc_chunk("d", 0, 1), emb(&[1.0]))]).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { .. }));
    assert_eq!(index.size(), 3);
}

#[test]
fn remove_document_only_touches_that_document() {
    let mut index = VectorIndex::new();
    index.insert(doc_chunk("a", 0, 2), emb(&[1.0, 0.0])).unwrap();
    index.insert(doc_chunk("b", 0, 1), emb(&[0.0, 1.0])).unwrap();
    index.insert(doc_chunk("a", 1, 2), emb(&[1.0, 1.0])).unwrap();
    assert_eq!(index.remove_document("a"), 2);
    assert_eq!(index.size(), 1);
    assert_eq!(index.get("b:0").unwrap().chunk.doc_id, "b");
    assert_eq!(index.dimension(), Some(2));
    assert_eq!(ids(&index, &[0.0, 1.0], 5), ["b:0"]);
}

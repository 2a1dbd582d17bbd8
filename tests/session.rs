//! End-to-end tests for the session pipeline.
//!
//! Tests the full stack: RagSession -> chunking -> EmbedderCache ->
//! VectorStore -> reduce, with the default hashing embeddings.

use std::sync::Arc;

use raglens::{
    Config, EmbedderCache, EmbeddingModel, IngestRequest, RagSession, ReductionMethod,
};

const FOX: &str = "the quick brown fox jumps over the lazy dog";

const PASSAGE: &str = "Retrieval augmented generation pairs a language model with a search \
    step. Documents are split into chunks and each chunk is embedded into a vector. \
    At question time the question is embedded with the same model and the nearest \
    chunks are retrieved. The retrieved chunks are placed into the prompt as context \
    so the model can ground its answer. Chunk size and overlap decide how much \
    context each vector carries. Small chunks are precise but lose surrounding \
    meaning while large chunks keep meaning but blur the match.";

fn new_session(cache: &Arc<EmbedderCache>) -> RagSession {
    RagSession::new(Config::default(), Arc::clone(cache)).unwrap()
}

fn fox_request() -> IngestRequest {
    IngestRequest::new(FOX).chunk_size(4).overlap(1).collection("t1")
}

// ============================================================================
// Ingest and query
// ============================================================================

#[test]
fn test_fox_end_to_end() {
    let cache = Arc::new(EmbedderCache::default());
    let mut session = new_session(&cache);

    let summary = session.ingest(fox_request()).unwrap();
    assert_eq!(summary.chunk_count, 3);
    assert_eq!(summary.model, EmbeddingModel::MiniLm);

    let ids: Vec<&str> = session.chunks().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["t1_0", "t1_1", "t1_2"]);

    let result = session.query("lazy dog", 1).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.hits[0].id, "t1_2");
    assert_eq!(result.hits[0].text, "the lazy dog");
    assert_eq!(result.hits[0].ordinal, Some(2));
}

#[test]
fn test_query_results_are_ranked() {
    let cache = Arc::new(EmbedderCache::default());
    let mut session = new_session(&cache);
    session
        .ingest(IngestRequest::new(PASSAGE).chunk_size(12).overlap(3))
        .unwrap();

    let n = session.chunks().len();
    let result = session.query("how big should chunks be", n + 10).unwrap();
    assert_eq!(result.len(), n);
    for w in result.hits.windows(2) {
        assert!(w[0].distance <= w[1].distance);
    }

    // Every chunk appears exactly once
    let mut ordinals = result.ordinals();
    ordinals.sort_unstable();
    assert_eq!(ordinals, (0..n).collect::<Vec<_>>());
}

#[test]
fn test_default_collection_and_model_dimension() {
    let cache = Arc::new(EmbedderCache::default());
    let mut session = new_session(&cache);
    let summary = session
        .ingest(IngestRequest::new(PASSAGE).model(EmbeddingModel::MpNet))
        .unwrap();

    assert_eq!(summary.collection, "rag_embeddings");
    assert_eq!(summary.dimension, 768);
    assert!(session.embeddings().iter().all(|e| e.len() == 768));
    assert_eq!(session.chunks()[0].id, "rag_embeddings_0");
}

#[test]
fn test_reingest_replaces_corpus_and_forgets_query() {
    let cache = Arc::new(EmbedderCache::default());
    let mut session = new_session(&cache);
    session.ingest(fox_request()).unwrap();
    session.query("lazy dog", 2).unwrap();
    assert!(session.last_result().is_some());

    session
        .ingest(IngestRequest::new(PASSAGE).chunk_size(20).overlap(5).collection("t1"))
        .unwrap();
    assert!(session.last_result().is_none());
    assert!(session.last_query_text().is_none());
    assert!(session.augment(None).unwrap_err().is_validation());

    let vis = session.visualize(ReductionMethod::Linear, true).unwrap();
    assert!(vis.query_point.is_none());
    assert!(vis.highlighted.is_empty());
    assert_eq!(vis.points.len(), session.chunks().len());
}

#[test]
fn test_failed_ingest_keeps_previous_corpus() {
    let cache = Arc::new(EmbedderCache::default());
    let mut session = new_session(&cache);
    session.ingest(fox_request()).unwrap();
    session.query("lazy dog", 1).unwrap();

    assert!(session.ingest(fox_request().chunk_size(0)).is_err());
    assert!(session.ingest(fox_request().collection("bad name!")).unwrap_err().is_validation());
    assert!(session.ingest(IngestRequest::new("\t\n")).unwrap_err().is_validation());

    assert_eq!(session.chunks().len(), 3);
    assert_eq!(session.last_query_text(), Some("lazy dog"));
    assert_eq!(session.query("lazy dog", 1).unwrap().hits[0].id, "t1_2");
}

#[test]
fn test_punctuation_only_chunks_are_ingested() {
    let cache = Arc::new(EmbedderCache::default());
    let mut session = new_session(&cache);

    let summary = session
        .ingest(IngestRequest::new("Hello world. Goodbye now \u{2014}").chunk_size(2).overlap(0))
        .unwrap();
    assert_eq!(summary.chunk_count, 3);
    assert_eq!(session.chunks()[2].text, "\u{2014}");

    session
        .ingest(IngestRequest::new("Wait ... what").chunk_size(1).overlap(0))
        .unwrap();
    assert_eq!(session.chunks()[1].text, "...");
    assert!(session.embeddings().iter().all(|e| e.len() == 384));
    assert_eq!(session.query("...", 1).unwrap().hits[0].text, "...");
}

#[test]
fn test_blank_query_rejected() {
    let cache = Arc::new(EmbedderCache::default());
    let mut session = new_session(&cache);
    session.ingest(fox_request()).unwrap();
    assert!(session.query("   ", 1).unwrap_err().is_validation());
}

// ============================================================================
// Visualization
// ============================================================================

#[test]
fn test_visualize_both_methods_with_query() {
    let cache = Arc::new(EmbedderCache::default());
    let mut session = new_session(&cache);
    session
        .ingest(IngestRequest::new(PASSAGE).chunk_size(8).overlap(2))
        .unwrap();
    session.query("nearest chunks", 3).unwrap();

    for method in ReductionMethod::ALL {
        let vis = session.visualize(method, true).unwrap();
        assert_eq!(vis.method, method);
        assert!(!vis.is_degraded());
        assert_eq!(vis.points.len(), session.chunks().len());
        assert_eq!(vis.texts.len(), vis.points.len());
        assert_eq!(vis.highlighted.len(), 3);
        assert!(vis.query_point.is_some());
    }
}

#[test]
fn test_visualization_is_deterministic() {
    let cache = Arc::new(EmbedderCache::default());
    let mut session = new_session(&cache);
    session
        .ingest(IngestRequest::new(PASSAGE).chunk_size(8).overlap(2))
        .unwrap();
    session.query("prompt context", 2).unwrap();

    let a = session.visualize(ReductionMethod::Manifold, true).unwrap();
    let b = session.visualize(ReductionMethod::Manifold, true).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_visualize_two_chunks_degrades() {
    let cache = Arc::new(EmbedderCache::default());
    let mut session = new_session(&cache);
    session
        .ingest(fox_request().chunk_size(5).overlap(0))
        .unwrap();

    let vis = session.visualize(ReductionMethod::Linear, false).unwrap();
    assert!(vis.is_degraded());
    assert_eq!(vis.points.len(), 2);
    assert!(vis.points.iter().all(|p| p.z == 0.0));
}

#[test]
fn test_visualization_json_for_renderer() {
    let cache = Arc::new(EmbedderCache::default());
    let mut session = new_session(&cache);
    session.ingest(fox_request()).unwrap();
    session.query("lazy dog", 1).unwrap();

    let vis = session.visualize(ReductionMethod::Linear, true).unwrap();
    let json = vis.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["points"].as_array().unwrap().len(), 3);
    assert_eq!(value["texts"][2], "the lazy dog");
    assert_eq!(value["highlighted"][0], 2);
    assert!(value["query_point"].is_object());
    assert!(value["warning"].is_null());
    assert_eq!(value["method"], "Linear");
}

#[tokio::test]
async fn test_visualize_in_background_matches_foreground() {
    let cache = Arc::new(EmbedderCache::default());
    let mut session = new_session(&cache);
    session
        .ingest(IngestRequest::new(PASSAGE).chunk_size(10).overlap(2))
        .unwrap();
    session.query("language model", 2).unwrap();

    let fg = session.visualize(ReductionMethod::Manifold, true).unwrap();
    let bg = session
        .visualize_in_background(ReductionMethod::Manifold, true)
        .await
        .unwrap();
    assert_eq!(fg, bg);
}

#[tokio::test]
async fn test_visualize_in_background_before_ingest() {
    let cache = Arc::new(EmbedderCache::default());
    let session = new_session(&cache);
    let err = session
        .visualize_in_background(ReductionMethod::Linear, false)
        .await
        .unwrap_err();
    assert!(err.is_not_indexed());
}

// ============================================================================
// Isolation and shared cache
// ============================================================================

#[test]
fn test_sessions_share_cache_but_not_state() {
    let cache = Arc::new(EmbedderCache::default());
    let mut a = new_session(&cache);
    let mut b = new_session(&cache);
    assert_ne!(a.id(), b.id());

    a.ingest(fox_request()).unwrap();
    assert!(!b.is_indexed());
    assert!(b.query("lazy dog", 1).unwrap_err().is_not_indexed());
    assert!(cache.is_loaded(EmbeddingModel::MiniLm));

    // Same collection name, different corpus
    b.ingest(IngestRequest::new(PASSAGE).chunk_size(15).overlap(0).collection("t1"))
        .unwrap();
    assert_eq!(a.chunks().len(), 3);
    assert_eq!(a.query("lazy dog", 1).unwrap().hits[0].text, "the lazy dog");
    assert!(Arc::ptr_eq(a.embedders(), b.embedders()));
}

#[tokio::test]
async fn test_sessions_on_separate_tasks() {
    let cache = Arc::new(EmbedderCache::default());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let mut session = RagSession::new(Config::default(), cache).unwrap();
                session
                    .ingest(fox_request().collection(format!("user{i}")))
                    .unwrap();
                let result = session.query("lazy dog", 1).unwrap();
                result.hits[0].id.clone()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), format!("user{i}_2"));
    }
    assert_eq!(cache.loaded_models(), vec![EmbeddingModel::MiniLm]);
}

// ============================================================================
// Stats and augmentation
// ============================================================================

#[test]
fn test_stats_json() {
    let cache = Arc::new(EmbedderCache::default());
    let mut session = new_session(&cache);
    session.ingest(fox_request()).unwrap();

    let stats = session.stats().unwrap();
    assert_eq!(stats.collection, "t1");
    let value: serde_json::Value = serde_json::from_str(&stats.to_json().unwrap()).unwrap();
    assert_eq!(value["chunk_count"], 3);
    assert_eq!(value["total_words"], 11);
}

#[test]
fn test_augment_numbers_context_in_rank_order() {
    let cache = Arc::new(EmbedderCache::default());
    let mut session = new_session(&cache);
    session.ingest(fox_request()).unwrap();
    let result = session.query("lazy dog", 2).unwrap();

    let prompt = session.augment(None).unwrap();
    assert_eq!(prompt.system_prompt, raglens::DEFAULT_SYSTEM_PROMPT);
    let expected_ids: Vec<String> = result.hits.iter().map(|h| h.id.clone()).collect();
    assert_eq!(prompt.context_ids, expected_ids);

    let first = prompt.user_prompt.find("[1]").unwrap();
    let second = prompt.user_prompt.find("[2]").unwrap();
    let question = prompt.user_prompt.find("Question: lazy dog").unwrap();
    assert!(first < second && second < question);
}

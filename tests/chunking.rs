//! Integration tests for the word-window chunker.
//!
//! Covers the documented examples, configuration errors, and coverage and
//! determinism properties over random text.

use proptest::prelude::*;
use raglens::{build_chunks, chunk_ordinal, chunk_words, ChunkingConfig};

/// Builds a text of `n` distinct words: `w0 w1 ... w{n-1}`.
fn numbered_words(n: usize) -> String {
    (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Examples
// ============================================================================

#[test]
fn test_fox_sentence() {
    let chunks = chunk_words("the quick brown fox jumps over the lazy dog", 4, 1).unwrap();
    assert_eq!(
        chunks,
        vec!["the quick brown fox", "fox jumps over the", "the lazy dog"]
    );
}

#[test]
fn test_25_words_no_overlap() {
    let chunks = chunk_words(&numbered_words(25), 10, 0).unwrap();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].split_whitespace().count(), 10);
    assert_eq!(chunks[1].split_whitespace().count(), 10);
    assert_eq!(chunks[2].split_whitespace().count(), 5);
}

#[test]
fn test_empty_text_is_not_an_error() {
    assert!(chunk_words("", 10, 2).unwrap().is_empty());
    assert!(chunk_words(" \n ", 10, 2).unwrap().is_empty());
}

#[test]
fn test_defaults() {
    let config = ChunkingConfig::default();
    assert_eq!((config.chunk_size, config.overlap), (100, 20));
    let chunks = chunk_words(&numbered_words(250), config.chunk_size, config.overlap).unwrap();
    // Starts at 0, 80, 160, 240
    assert_eq!(chunks.len(), 4);
}

#[test]
fn test_build_chunks_ids_and_offsets() {
    let chunks = build_chunks("docs", &numbered_words(7), &ChunkingConfig::new(3, 1)).unwrap();
    let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    let offsets: Vec<usize> = chunks.iter().map(|c| c.source_offset).collect();
    assert_eq!(ids, vec!["docs_0", "docs_1", "docs_2"]);
    assert_eq!(offsets, vec![0, 2, 4]);
    assert_eq!(chunk_ordinal(&chunks[2].id), Some(2));
}

// ============================================================================
// Configuration errors
// ============================================================================

#[test]
fn test_overlap_equal_to_size_rejected() {
    let err = chunk_words("a b c", 4, 4).unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_overlap_larger_than_size_rejected() {
    assert!(chunk_words("a b c", 4, 9).unwrap_err().is_config());
}

#[test]
fn test_invalid_config_rejected_even_for_empty_text() {
    assert!(chunk_words("", 2, 2).is_err());
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_every_word_is_covered(
        n in 0usize..200,
        chunk_size in 1usize..30,
        overlap_frac in 0.0f64..1.0,
    ) {
        let overlap = ((chunk_size as f64) * overlap_frac) as usize;
        prop_assume!(overlap < chunk_size);

        let text = numbered_words(n);
        let chunks = chunk_words(&text, chunk_size, overlap).unwrap();

        let mut seen = vec![false; n];
        for chunk in &chunks {
            for word in chunk.split_whitespace() {
                let i: usize = word[1..].parse().unwrap();
                seen[i] = true;
            }
        }
        prop_assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn prop_windows_are_contiguous_and_bounded(
        n in 1usize..200,
        chunk_size in 1usize..30,
        overlap in 0usize..30,
    ) {
        prop_assume!(overlap < chunk_size);
        let text = numbered_words(n);
        let chunks = build_chunks("p", &text, &ChunkingConfig::new(chunk_size, overlap)).unwrap();
        let stride = chunk_size - overlap;

        prop_assert_eq!(chunks.len(), n.div_ceil(stride));
        for (ordinal, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.source_offset, ordinal * stride);
            let words: Vec<&str> = chunk.text.split_whitespace().collect();
            prop_assert!(!words.is_empty() && words.len() <= chunk_size);
            prop_assert_eq!(words[0], format!("w{}", chunk.source_offset));
        }
    }

    #[test]
    fn prop_chunking_is_deterministic(
        text in "[a-z ]{0,300}",
        chunk_size in 1usize..20,
        overlap in 0usize..20,
    ) {
        prop_assume!(overlap < chunk_size);
        let a = chunk_words(&text, chunk_size, overlap).unwrap();
        let b = chunk_words(&text, chunk_size, overlap).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_invalid_overlap_always_rejected(
        text in "[a-z ]{0,50}",
        chunk_size in 1usize..20,
        extra in 0usize..10,
    ) {
        prop_assert!(chunk_words(&text, chunk_size, chunk_size + extra).is_err());
    }
}

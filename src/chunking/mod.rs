//! Word-window chunking.
//!
//! Text is tokenized on whitespace and cut into windows of `chunk_size`
//! words whose starts advance by `chunk_size - overlap` words:
//!
//! ```text
//! words:   the quick brown fox jumps over the lazy dog
//! size=4, overlap=1, stride=3
//!   [0..4)  the quick brown fox
//!   [3..7)                  fox jumps over the
//!   [6..9)                                 the lazy dog
//! ```
//!
//! The last window may be shorter than `chunk_size`. Empty text yields no
//! chunks.

use tracing::debug;

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::{chunk_id, Chunk};

/// Splits `text` into overlapping word windows.
///
/// # Errors
///
/// Returns `InvalidConfiguration` if `chunk_size` is 0 or
/// `overlap >= chunk_size`.
///
/// # Example
///
/// ```rust
/// let chunks = raglens::chunk_words("the quick brown fox jumps over the lazy dog", 4, 1).unwrap();
/// assert_eq!(
///     chunks,
///     vec!["the quick brown fox", "fox jumps over the", "the lazy dog"]
/// );
/// ```
pub fn chunk_words(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    let config = ChunkingConfig::new(chunk_size, overlap);
    Ok(windows(text, &config)?
        .into_iter()
        .map(|(_, window)| window)
        .collect())
}

/// Splits `text` into [`Chunk`]s whose ids are `"<collection>_<ordinal>"`.
///
/// `source_offset` of each chunk is the word index where its window starts.
pub fn build_chunks(collection: &str, text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let chunks: Vec<Chunk> = windows(text, config)?
        .into_iter()
        .enumerate()
        .map(|(ordinal, (source_offset, text))| Chunk {
            id: chunk_id(collection, ordinal),
            text,
            source_offset,
        })
        .collect();

    debug!(
        collection,
        chunk_size = config.chunk_size,
        overlap = config.overlap,
        chunks = chunks.len(),
        "Chunked text"
    );

    Ok(chunks)
}

/// Returns `(start_word, window_text)` pairs.
fn windows(text: &str, config: &ChunkingConfig) -> Result<Vec<(usize, String)>> {
    config.validate()?;

    let words: Vec<&str> = text.split_whitespace().collect();
    let stride = config.stride();

    let mut out = Vec::with_capacity(words.len().div_ceil(stride));
    let mut start = 0;
    while start < words.len() {
        let end = (start + config.chunk_size).min(words.len());
        out.push((start, words[start..end].join(" ")));
        start += stride;
    }

    Ok(out)
}

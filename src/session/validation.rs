//! Input validation for session operations.
//!
//! ```text
//! RagSession::ingest()
//!     ├── validate_ingest_request()   ← text, collection name
//!     ├── ChunkingConfig::validate()  ← chunk_size, overlap
//!     └── chunk → embed → index       ← only reached if valid
//! ```

use crate::error::{RagLensError, ValidationError};
use crate::session::types::IngestRequest;

/// Longest accepted collection name.
pub const MAX_COLLECTION_NAME_LENGTH: usize = 63;

/// Validates the caller-supplied parts of an [`IngestRequest`].
///
/// # Rules
///
/// | Field | Constraint |
/// |-------|------------|
/// | `text` | Contains at least one non-whitespace character |
/// | `collection` | Non-empty, max 63 chars, ASCII letters, digits, `_`, `-`, `.` |
pub(crate) fn validate_ingest_request(
    request: &IngestRequest,
    collection: &str,
) -> Result<(), RagLensError> {
    // Whitespace-only text would produce zero chunks
    if request.text.trim().is_empty() {
        return Err(ValidationError::required_field("text").into());
    }

    validate_collection_name(collection)
}

/// Validates a collection name.
pub(crate) fn validate_collection_name(name: &str) -> Result<(), RagLensError> {
    if name.is_empty() {
        return Err(ValidationError::required_field("collection").into());
    }

    if name.len() > MAX_COLLECTION_NAME_LENGTH {
        return Err(ValidationError::invalid_field(
            "collection",
            format!(
                "must be at most {MAX_COLLECTION_NAME_LENGTH} characters, got {}",
                name.len()
            ),
        )
        .into());
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(ValidationError::invalid_field(
            "collection",
            format!("contains invalid character {c:?}"),
        )
        .into());
    }

    Ok(())
}

/// Validates a query string.
pub(crate) fn validate_query(text: &str) -> Result<(), RagLensError> {
    if text.trim().is_empty() {
        return Err(ValidationError::required_field("query").into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let request = IngestRequest::new("hello world");
        assert!(validate_ingest_request(&request, "rag_embeddings").is_ok());
    }

    #[test]
    fn test_blank_text_required() {
        let request = IngestRequest::new(" \n\t ");
        let err = validate_ingest_request(&request, "t1").unwrap_err();
        assert!(matches!(
            err,
            RagLensError::Validation(ValidationError::RequiredField { ref field }) if field == "text"
        ));
    }

    #[test]
    fn test_collection_names() {
        assert!(validate_collection_name("t1").is_ok());
        assert!(validate_collection_name("my-docs.v2_final").is_ok());
        assert!(validate_collection_name("").unwrap_err().is_validation());
        assert!(validate_collection_name("has space").unwrap_err().is_validation());
        assert!(validate_collection_name(&"x".repeat(64)).unwrap_err().is_validation());
    }

    #[test]
    fn test_blank_query() {
        assert!(validate_query("lazy dog").is_ok());
        assert!(validate_query("   ").unwrap_err().is_validation());
    }
}

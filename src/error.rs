//! Error types for RagLens.
//!
//! RagLens uses a hierarchical error system:
//! - `RagLensError` is the top-level error returned by all public APIs
//! - Specific error types (`ValidationError`, `IndexError`, `ReductionError`)
//!   provide detail
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use raglens::{RagSession, IngestRequest, Result};
//!
//! fn example(session: &mut RagSession) -> Result<()> {
//!     session.ingest(IngestRequest::new("some passage of text"))?;
//!     let result = session.query("passage", 3)?;
//!     println!("{} hits", result.len());
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias for RagLens operations.
pub type Result<T> = std::result::Result<T, RagLensError>;

/// Top-level error enum for all RagLens operations.
///
/// This is the only error type returned by public APIs.
/// Use pattern matching to handle specific error cases.
#[derive(Debug, Error)]
pub enum RagLensError {
    /// A parameter is outside its allowed range (e.g. `overlap >= chunk_size`).
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of what's wrong with the configuration.
        reason: String,
    },

    /// Input validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The embedding model could not be resolved or loaded.
    #[error("Failed to load model '{model}': {reason}")]
    ModelLoad {
        /// Identifier that was requested.
        model: String,
        /// Why loading failed.
        reason: String,
    },

    /// Embedding generation/validation error.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index contract violation.
    #[error("Vector index error: {0}")]
    Index(#[from] IndexError),

    /// Dimensionality reduction could not run on the given input.
    #[error("Reduction error: {0}")]
    Reduction(#[from] ReductionError),

    /// Query, visualization or augmentation before any successful ingestion.
    #[error("Session has no indexed collection; ingest text first")]
    NotIndexed,

    /// A background task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),

    /// JSON encoding/decoding error (config files, renderer payloads).
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RagLensError {
    fn from(err: serde_json::Error) -> Self {
        RagLensError::Serialization(err.to_string())
    }
}

impl RagLensError {
    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Creates an embedding error with the given message.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Creates a model load error for the given identifier.
    pub fn model_load(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelLoad {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::InvalidConfiguration { .. })
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a model load error.
    pub fn is_model_load(&self) -> bool {
        matches!(self, Self::ModelLoad { .. })
    }

    /// Returns true if this is an embedding error.
    pub fn is_embedding(&self) -> bool {
        matches!(self, Self::Embedding(_))
    }

    /// Returns true if this is a vector index error.
    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    /// Returns true if the session has not been indexed yet.
    pub fn is_not_indexed(&self) -> bool {
        matches!(self, Self::NotIndexed)
    }

    /// Returns true if a reduction was refused for lack of samples.
    ///
    /// Callers are expected to degrade the display rather than abort.
    pub fn is_insufficient_samples(&self) -> bool {
        matches!(
            self,
            Self::Reduction(ReductionError::InsufficientSamples { .. })
        )
    }
}

/// Validation errors for caller-supplied data.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field has an invalid value.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the invalid field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// A required field is missing or empty.
    #[error("Required field missing: {field}")]
    RequiredField {
        /// Name of the missing field.
        field: String,
    },
}

impl ValidationError {
    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a required field error.
    pub fn required_field(field: impl Into<String>) -> Self {
        Self::RequiredField {
            field: field.into(),
        }
    }
}

/// Errors raised by collections and vector indexes.
///
/// These always indicate a defect in the caller; nothing is inserted when
/// one is returned.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Parallel input sequences had different lengths.
    #[error("Shape mismatch: {ids} ids, {vectors} vectors, {documents} documents")]
    ShapeMismatch {
        /// Number of ids supplied.
        ids: usize,
        /// Number of vectors supplied.
        vectors: usize,
        /// Number of documents supplied.
        documents: usize,
    },

    /// An id was repeated within a batch or already exists in the collection.
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// Vector length doesn't match the collection's dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension fixed by the first insert.
        expected: usize,
        /// Dimension provided.
        got: usize,
    },

    /// No collection is registered under this name.
    #[error("Collection not found: {0}")]
    UnknownCollection(String),

    /// The collection was replaced after this handle was issued.
    #[error("Stale handle for collection '{name}': it was replaced")]
    StaleHandle {
        /// Collection name.
        name: String,
    },
}

impl IndexError {
    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }
}

/// Errors raised by dimensionality reduction.
#[derive(Debug, Error)]
pub enum ReductionError {
    /// Too few vectors for the requested method and target dimension.
    #[error("{method} reduction needs at least {required} vectors, got {got}")]
    InsufficientSamples {
        /// Method name (`linear` or `manifold`).
        method: &'static str,
        /// Minimum number of vectors.
        required: usize,
        /// Number of vectors supplied.
        got: usize,
    },

    /// Rows of the input matrix have different lengths.
    #[error("Row {row} has {got} columns, expected {expected}")]
    RaggedInput {
        /// Offending row.
        row: usize,
        /// Column count of row 0.
        expected: usize,
        /// Column count of the offending row.
        got: usize,
    },

    /// No vectors at all, or vectors with zero length.
    #[error("Nothing to reduce: input is empty")]
    EmptyInput,
}

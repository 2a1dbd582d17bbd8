//! The fixed set of sentence-embedding models a session can select.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RagLensError;

/// A recognized sentence-embedding model.
///
/// Parse from either the full HuggingFace repo id or the short name:
///
/// ```rust
/// use raglens::EmbeddingModel;
///
/// let a: EmbeddingModel = "sentence-transformers/all-mpnet-base-v2".parse().unwrap();
/// let b: EmbeddingModel = "all-mpnet-base-v2".parse().unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.dimension(), 768);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddingModel {
    /// all-MiniLM-L6-v2 (384 dimensions, 256 max tokens).
    #[default]
    MiniLm,

    /// all-mpnet-base-v2 (768 dimensions, 384 max tokens).
    MpNet,

    /// paraphrase-multilingual-MiniLM-L12-v2 (384 dimensions, 128 max tokens).
    MultilingualMiniLm,
}

impl EmbeddingModel {
    /// Every recognized model, in display order.
    pub const ALL: [EmbeddingModel; 3] = [Self::MiniLm, Self::MpNet, Self::MultilingualMiniLm];

    /// Full HuggingFace repository id.
    pub const fn identifier(&self) -> &'static str {
        match self {
            Self::MiniLm => "sentence-transformers/all-MiniLM-L6-v2",
            Self::MpNet => "sentence-transformers/all-mpnet-base-v2",
            Self::MultilingualMiniLm => {
                "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2"
            }
        }
    }

    /// Repository name without the organization prefix.
    pub fn short_name(&self) -> &'static str {
        let id = self.identifier();
        id.rsplit_once('/').map_or(id, |(_, name)| name)
    }

    /// Human label for selection widgets.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::MiniLm => "all-MiniLM-L6-v2 (Fast)",
            Self::MpNet => "all-mpnet-base-v2 (Accurate)",
            Self::MultilingualMiniLm => "paraphrase-multilingual (Multilingual)",
        }
    }

    /// Length of every vector this model produces.
    pub const fn dimension(&self) -> usize {
        match self {
            Self::MiniLm | Self::MultilingualMiniLm => 384,
            Self::MpNet => 768,
        }
    }

    /// Maximum tokens per input the model accepts.
    pub const fn max_length(&self) -> usize {
        match self {
            Self::MiniLm => 256,
            Self::MpNet => 384,
            Self::MultilingualMiniLm => 128,
        }
    }

    /// Resolves an identifier or short name.
    ///
    /// # Errors
    ///
    /// Returns `ModelLoad` for anything outside the fixed set.
    pub fn from_identifier(identifier: &str) -> Result<Self, RagLensError> {
        let wanted = identifier.trim();
        Self::ALL
            .into_iter()
            .find(|m| {
                m.identifier().eq_ignore_ascii_case(wanted)
                    || m.short_name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| RagLensError::model_load(identifier, "unknown model identifier"))
    }
}

impl FromStr for EmbeddingModel {
    type Err = RagLensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_identifier(s)
    }
}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_roundtrip() {
        for model in EmbeddingModel::ALL {
            assert_eq!(EmbeddingModel::from_identifier(model.identifier()).unwrap(), model);
            assert_eq!(EmbeddingModel::from_identifier(model.short_name()).unwrap(), model);
        }
    }

    #[test]
    fn test_short_name() {
        assert_eq!(EmbeddingModel::MiniLm.short_name(), "all-MiniLM-L6-v2");
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(
            "ALL-MINILM-L6-V2".parse::<EmbeddingModel>().unwrap(),
            EmbeddingModel::MiniLm
        );
    }

    #[test]
    fn test_unknown_identifier() {
        let err = EmbeddingModel::from_identifier("openai/text-embedding-3-small").unwrap_err();
        assert!(err.is_model_load());
    }

    #[test]
    fn test_dimensions() {
        assert_eq!(EmbeddingModel::MiniLm.dimension(), 384);
        assert_eq!(EmbeddingModel::MpNet.dimension(), 768);
        assert_eq!(EmbeddingModel::MultilingualMiniLm.dimension(), 384);
    }
}

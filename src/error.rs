//! Error taxonomy for the vectorization core.

use std::path::PathBuf;

use thiserror::Error;

/// Failures that escape the vectorization layer.
///
/// Row-level problems (a span that cannot be located, a record whose tokens are
/// all out of vocabulary) never surface here; backends recover from them locally.
#[derive(Debug, Error)]
pub enum VectorizeError {
    #[error("unknown vectorizer strategy `{0}`")]
    UnknownStrategy(String),
    #[error("unknown pretraining corpus `{0}` (expected `default` or `cadec`)")]
    UnknownCorpus(String),
    #[error("unknown word tokenizer `{0}`")]
    UnknownTokenizer(String),
    #[error("strategy `{strategy}` requires the `{feature}` cargo feature")]
    BackendUnavailable {
        strategy: &'static str,
        feature: &'static str,
    },
    #[error("artifact {}: {reason}", path.display())]
    Artifact { path: PathBuf, reason: String },
    #[error("model inference failed: {0}")]
    Model(String),
}

impl VectorizeError {
    pub fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Artifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = VectorizeError> = std::result::Result<T, E>;

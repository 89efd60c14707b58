//! Whole-sentence embedding backend.

use std::sync::Arc;

use crate::{
    data::{RecordBatch, VectorValue},
    error::{Result, VectorizeError},
    vectorize::VectorizeBatch,
};

/// Pretrained model mapping each input text to one vector.
pub trait SentenceEmbedder: Send + Sync {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

pub struct SentenceBackend {
    embedder: Arc<dyn SentenceEmbedder>,
}

impl SentenceBackend {
    pub fn new(embedder: Arc<dyn SentenceEmbedder>) -> Self {
        Self { embedder }
    }
}

impl VectorizeBatch for SentenceBackend {
    fn vectorize_batch(&self, batch: &RecordBatch) -> Result<Vec<Option<VectorValue>>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<&str> = batch.rows().iter().map(|row| row.term.as_str()).collect();
        let vectors = self.embedder.embed(&texts)?;
        if vectors.len() != texts.len() {
            return Err(VectorizeError::Model(format!(
                "sentence embedder returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors
            .into_iter()
            .map(|v| Some(VectorValue::Dense(v)))
            .collect())
    }
}

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedder;

#[cfg(feature = "embeddings")]
mod fastembed_impl {
    use std::sync::Mutex;

    use fastembed::TextEmbedding;
    use tracing::info;

    use super::SentenceEmbedder;
    use crate::error::{Result, VectorizeError};

    /// Default fastembed sentence model.
    pub struct FastEmbedder {
        model: Mutex<TextEmbedding>,
    }

    impl FastEmbedder {
        pub fn try_new() -> Result<Self> {
            let model = TextEmbedding::try_new(Default::default())
                .map_err(|e| VectorizeError::Model(e.to_string()))?;
            info!("loaded fastembed sentence model");
            Ok(Self {
                model: Mutex::new(model),
            })
        }
    }

    impl SentenceEmbedder for FastEmbedder {
        fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            let mut model = self
                .model
                .lock()
                .map_err(|e| VectorizeError::Model(format!("embedder lock poisoned: {e}")))?;
            model
                .embed(texts.to_vec(), None)
                .map_err(|e| VectorizeError::Model(e.to_string()))
        }
    }
}

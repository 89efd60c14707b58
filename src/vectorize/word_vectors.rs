//! Static word-vector backends (FastText, Word2Vec).

use std::sync::Arc;

use tracing::debug;

use crate::{
    data::{RecordBatch, VectorValue},
    error::Result,
    nlp::{aggregate::Aggregation, tokenizer::WordTokenizer},
    vectorize::VectorizeBatch,
};

/// Read-only lookup from a word to its embedding.
pub trait EmbeddingTable: Send + Sync {
    fn dim(&self) -> usize;
    /// Vector for `word`, or `None` when it is out of vocabulary.
    fn lookup(&self, word: &str) -> Option<Vec<f32>>;
}

/// Tokenize, look up, aggregate.
pub struct WordVectorBackend {
    table: Arc<dyn EmbeddingTable>,
    tokenizer: Arc<dyn WordTokenizer>,
    aggregation: Aggregation,
}

impl WordVectorBackend {
    pub fn new(
        table: Arc<dyn EmbeddingTable>,
        tokenizer: Arc<dyn WordTokenizer>,
        aggregation: Aggregation,
    ) -> Self {
        Self {
            table,
            tokenizer,
            aggregation,
        }
    }

    fn vectorize_one(&self, raw: &str) -> Option<VectorValue> {
        let tokens = self.tokenizer.tokenize(raw);
        if tokens.len() <= 1 {
            return Some(VectorValue::Raw(raw.to_string()));
        }
        let vectors: Vec<Vec<f32>> = tokens
            .iter()
            .filter_map(|token| self.table.lookup(token))
            .collect();
        if vectors.is_empty() {
            debug!(term = raw, "every token out of vocabulary");
        }
        self.aggregation.apply(&vectors).map(VectorValue::Dense)
    }
}

impl VectorizeBatch for WordVectorBackend {
    fn vectorize_batch(&self, batch: &RecordBatch) -> Result<Vec<Option<VectorValue>>> {
        Ok(batch
            .rows()
            .iter()
            .map(|row| self.vectorize_one(&row.term))
            .collect())
    }
}

//! Sentence vectorization: strategy dispatch over heterogeneous embedding backends.

pub mod encoder;
pub mod fasttext;
pub mod loader;
#[cfg(feature = "onx")]
pub mod onnx;
pub mod sentence;
pub mod span;
pub mod strategy;
pub mod tfidf;
pub mod word2vec;
pub mod word_vectors;

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex},
};

use tracing::{debug, info, instrument};

use crate::{
    data::{RecordBatch, VectorValue, TERM_FIELD},
    error::{Result, VectorizeError},
};

pub use loader::{ArtifactLoader, ArtifactPaths, BackendLoader};
pub use strategy::{list_strategies, Strategy};

use self::{
    encoder::EncoderBackend, sentence::SentenceBackend, span::SpanContextBackend,
    tfidf::TfidfBackend, word_vectors::WordVectorBackend,
};

/// Anything that turns a batch into one value per record, in order.
pub trait VectorizeBatch {
    fn vectorize_batch(&self, batch: &RecordBatch) -> Result<Vec<Option<VectorValue>>>;
}

/// A loaded backend, one variant per implementation.
pub enum Backend {
    WordVectors(WordVectorBackend),
    SpanContext(SpanContextBackend),
    Sentence(SentenceBackend),
    Encoder(EncoderBackend),
    Tfidf(TfidfBackend),
}

impl Backend {
    /// Whether rows without a vector are removed instead of left missing.
    pub fn drops_missing(&self) -> bool {
        matches!(self, Self::SpanContext(_))
    }
}

impl VectorizeBatch for Backend {
    fn vectorize_batch(&self, batch: &RecordBatch) -> Result<Vec<Option<VectorValue>>> {
        match self {
            Self::WordVectors(backend) => backend.vectorize_batch(batch),
            Self::SpanContext(backend) => backend.vectorize_batch(batch),
            Self::Sentence(backend) => backend.vectorize_batch(batch),
            Self::Encoder(backend) => backend.vectorize_batch(batch),
            Self::Tfidf(backend) => backend.vectorize_batch(batch),
        }
    }
}

/// Routes record batches to the backend selected by strategy name.
///
/// Backends are loaded through the [`BackendLoader`] on first use and cached
/// per strategy; the cached handles are read-only.
pub struct SentenceVectorizer {
    loader: Box<dyn BackendLoader>,
    cache: Mutex<HashMap<Strategy, Arc<Backend>>>,
    n_jobs: usize,
}

impl SentenceVectorizer {
    pub fn new(loader: impl BackendLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            cache: Mutex::new(HashMap::new()),
            n_jobs: 1,
        }
    }

    /// Record the requested parallelism. Vectorization itself stays sequential.
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn n_jobs(&self) -> usize {
        self.n_jobs
    }

    pub fn list_strategies(&self) -> BTreeSet<&'static str> {
        list_strategies()
    }

    /// Vectorize `batch` with the strategy called `name`.
    pub fn vectorize(&self, batch: RecordBatch, name: &str) -> Result<RecordBatch> {
        let strategy: Strategy = name.parse()?;
        self.vectorize_with(batch, strategy)
    }

    #[instrument(skip(self, batch), fields(rows = batch.len(), n_jobs = self.n_jobs))]
    pub fn vectorize_with(&self, mut batch: RecordBatch, strategy: Strategy) -> Result<RecordBatch> {
        if batch.is_empty() {
            batch.append_vectors(TERM_FIELD, Vec::new());
            return Ok(batch);
        }
        let backend = self.backend(strategy)?;
        let values = backend.vectorize_batch(&batch)?;
        if values.len() != batch.len() {
            return Err(VectorizeError::Model(format!(
                "{strategy} produced {} values for {} rows",
                values.len(),
                batch.len()
            )));
        }
        check_uniform_width(strategy, &values)?;
        batch.append_vectors(TERM_FIELD, values);
        if backend.drops_missing() {
            let dropped = batch.drop_missing();
            if dropped > 0 {
                info!(%strategy, dropped, "dropped rows without attributed subwords");
            }
        }
        Ok(batch)
    }

    /// Cached backend for `strategy`, loading it on first use.
    pub fn backend(&self, strategy: Strategy) -> Result<Arc<Backend>> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|e| VectorizeError::Model(format!("backend cache poisoned: {e}")))?;
        if let Some(backend) = cache.get(&strategy) {
            debug!(%strategy, "reusing cached backend");
            return Ok(Arc::clone(backend));
        }
        info!(%strategy, "loading backend");
        let backend = Arc::new(self.loader.load(strategy)?);
        cache.insert(strategy, Arc::clone(&backend));
        Ok(backend)
    }

    /// Forget the cached backend so the next call reloads its artifacts.
    pub fn invalidate(&self, strategy: Strategy) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(&strategy);
        }
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

fn check_uniform_width(strategy: Strategy, values: &[Option<VectorValue>]) -> Result<()> {
    let mut widths = values.iter().flatten().filter_map(VectorValue::len);
    if let Some(first) = widths.next() {
        if let Some(other) = widths.find(|&w| w != first) {
            return Err(VectorizeError::Model(format!(
                "{strategy} produced vectors of length {first} and {other}"
            )));
        }
    }
    Ok(())
}

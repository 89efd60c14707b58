//! Loading backend artifacts from configured paths.

use std::{path::PathBuf, sync::Arc};

use crate::{
    config::Settings,
    error::{Result, VectorizeError},
    nlp::{
        aggregate::{Aggregation, SpanPooling},
        tokenizer::{self, WordTokenizer},
    },
    vectorize::{
        encoder::{DenseEncoder, EncoderBackend, SequenceEncoder, SequenceTokenizer},
        fasttext::FastTextModel,
        span::{SpanContextBackend, SubwordModel},
        tfidf::{TfidfBackend, TfidfModel},
        word2vec::WordVectors,
        word_vectors::{EmbeddingTable, WordVectorBackend},
        Backend, Strategy,
    },
};

/// Produces a ready-to-use backend for a strategy.
pub trait BackendLoader: Send + Sync {
    fn load(&self, strategy: Strategy) -> Result<Backend>;
}

/// Locations of every pretrained artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub fasttext: PathBuf,
    pub word2vec: PathBuf,
    pub tfidf: PathBuf,
    pub encoder_model: PathBuf,
    pub encoder_tokenizer: PathBuf,
    /// Root holding one `<model-id>/` directory per transformer.
    pub transformers_dir: PathBuf,
}

impl ArtifactPaths {
    pub fn transformer_dir(&self, model_id: &str) -> PathBuf {
        self.transformers_dir.join(model_id)
    }
}

/// Default loader reading artifacts from disk.
pub struct ArtifactLoader {
    paths: ArtifactPaths,
    tokenizer: Arc<dyn WordTokenizer>,
    aggregation: Aggregation,
    pooling: SpanPooling,
    max_seq_len: usize,
}

impl ArtifactLoader {
    pub fn new(
        paths: ArtifactPaths,
        tokenizer: Arc<dyn WordTokenizer>,
        aggregation: Aggregation,
        pooling: SpanPooling,
        max_seq_len: usize,
    ) -> Self {
        Self {
            paths,
            tokenizer,
            aggregation,
            pooling,
            max_seq_len,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            settings.artifact_paths(),
            tokenizer::from_name(&settings.tokenizer_name)?,
            settings.agg_type,
            settings.span_pooling,
            settings.max_seq_len,
        ))
    }

    fn word_vectors(&self, table: Arc<dyn EmbeddingTable>) -> Backend {
        Backend::WordVectors(WordVectorBackend::new(
            table,
            Arc::clone(&self.tokenizer),
            self.aggregation,
        ))
    }

    fn fasttext_table(&self) -> Result<Arc<dyn EmbeddingTable>> {
        let path = &self.paths.fasttext;
        if path.extension().and_then(|e| e.to_str()) == Some("bin") {
            Ok(Arc::new(FastTextModel::load(path)?))
        } else {
            Ok(Arc::new(WordVectors::load(path)?))
        }
    }

    fn encoder(&self) -> Result<Arc<dyn SequenceEncoder>> {
        let path = &self.paths.encoder_model;
        match path.extension().and_then(|e| e.to_str()) {
            Some("onnx") => onnx_encoder(path),
            _ => Ok(Arc::new(DenseEncoder::load(path)?)),
        }
    }

    fn span_context(&self, strategy: Strategy) -> Result<Backend> {
        let model_id = strategy
            .transformer_id()
            .ok_or_else(|| VectorizeError::UnknownStrategy(strategy.to_string()))?;
        let model = subword_model(strategy, self.paths.transformer_dir(model_id))?;
        Ok(Backend::SpanContext(SpanContextBackend::new(
            model,
            self.pooling,
        )))
    }
}

impl BackendLoader for ArtifactLoader {
    fn load(&self, strategy: Strategy) -> Result<Backend> {
        match strategy {
            Strategy::FasttextFacebook => Ok(self.word_vectors(self.fasttext_table()?)),
            Strategy::Word2Vec => Ok(self.word_vectors(Arc::new(WordVectors::load(
                &self.paths.word2vec,
            )?))),
            Strategy::BertBaseUncased | Strategy::BertPubMed | Strategy::BertweetBase => {
                self.span_context(strategy)
            }
            Strategy::Sent2Vec => sentence_backend(strategy),
            Strategy::Encoder => {
                let tokenizer = SequenceTokenizer::load(&self.paths.encoder_tokenizer)?;
                Ok(Backend::Encoder(EncoderBackend::new(
                    Arc::new(tokenizer),
                    self.encoder()?,
                    self.max_seq_len,
                )))
            }
            Strategy::Tfidf => Ok(Backend::Tfidf(TfidfBackend::new(
                Arc::new(TfidfModel::load(&self.paths.tfidf)?),
                Arc::clone(&self.tokenizer),
            ))),
        }
    }
}

#[cfg(feature = "onx")]
fn subword_model(
    _strategy: Strategy,
    dir: PathBuf,
) -> Result<Arc<dyn SubwordModel>> {
    Ok(Arc::new(crate::vectorize::onnx::OnnxSubwordModel::load(&dir)?))
}

#[cfg(not(feature = "onx"))]
fn subword_model(
    strategy: Strategy,
    _dir: PathBuf,
) -> Result<Arc<dyn SubwordModel>> {
    Err(VectorizeError::BackendUnavailable {
        strategy: strategy.as_str(),
        feature: "onx",
    })
}

#[cfg(feature = "onx")]
fn onnx_encoder(path: &std::path::Path) -> Result<Arc<dyn SequenceEncoder>> {
    Ok(Arc::new(crate::vectorize::onnx::OnnxSequenceEncoder::load(path)?))
}

#[cfg(not(feature = "onx"))]
fn onnx_encoder(_path: &std::path::Path) -> Result<Arc<dyn SequenceEncoder>> {
    Err(VectorizeError::BackendUnavailable {
        strategy: Strategy::Encoder.as_str(),
        feature: "onx",
    })
}

#[cfg(feature = "embeddings")]
fn sentence_backend(_strategy: Strategy) -> Result<Backend> {
    use crate::vectorize::sentence::{FastEmbedder, SentenceBackend};
    Ok(Backend::Sentence(SentenceBackend::new(Arc::new(
        FastEmbedder::try_new()?,
    ))))
}

#[cfg(not(feature = "embeddings"))]
fn sentence_backend(strategy: Strategy) -> Result<Backend> {
    Err(VectorizeError::BackendUnavailable {
        strategy: strategy.as_str(),
        feature: "embeddings",
    })
}

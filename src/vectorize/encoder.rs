//! Sequence tokenizer + trained encoder backend.

use std::{collections::HashMap, fs, path::Path, sync::Arc};

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    data::{RecordBatch, VectorValue},
    error::{Result, VectorizeError},
    vectorize::VectorizeBatch,
};

pub const DEFAULT_MAX_SEQ_LEN: usize = 10;
const DEFAULT_FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Word-index tokenizer compatible with the Keras `Tokenizer.to_json` layout.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceTokenizer {
    pub word_index: HashMap<String, usize>,
    pub num_words: Option<usize>,
    pub filters: String,
    pub lower: bool,
    pub split: String,
    pub char_level: bool,
    pub oov_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KerasTokenizerJson {
    config: KerasTokenizerConfig,
}

#[derive(Debug, Deserialize)]
struct KerasTokenizerConfig {
    num_words: Option<usize>,
    #[serde(default = "default_filters")]
    filters: String,
    #[serde(default = "default_true")]
    lower: bool,
    #[serde(default = "default_split")]
    split: String,
    #[serde(default)]
    char_level: bool,
    oov_token: Option<String>,
    /// Keras stores this as a JSON-encoded string; plain objects are accepted too.
    word_index: serde_json::Value,
}

fn default_filters() -> String {
    DEFAULT_FILTERS.to_string()
}

fn default_true() -> bool {
    true
}

fn default_split() -> String {
    " ".to_string()
}

impl SequenceTokenizer {
    pub fn new(word_index: HashMap<String, usize>) -> Self {
        Self {
            word_index,
            num_words: None,
            filters: default_filters(),
            lower: true,
            split: default_split(),
            char_level: false,
            oov_token: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| VectorizeError::artifact(path, e))?;
        let parsed: KerasTokenizerJson =
            serde_json::from_str(&raw).map_err(|e| VectorizeError::artifact(path, e))?;
        let config = parsed.config;
        let word_index: HashMap<String, usize> = match config.word_index {
            serde_json::Value::String(encoded) => serde_json::from_str(&encoded),
            other => serde_json::from_value(other),
        }
        .map_err(|e| VectorizeError::artifact(path, e))?;
        info!(path = %path.display(), words = word_index.len(), "loaded sequence tokenizer");
        Ok(Self {
            word_index,
            num_words: config.num_words,
            filters: config.filters,
            lower: config.lower,
            split: config.split,
            char_level: config.char_level,
            oov_token: config.oov_token,
        })
    }

    fn words(&self, text: &str) -> Vec<String> {
        let text = if self.lower {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        if self.char_level {
            return text.chars().map(String::from).collect();
        }
        let translated: String = text
            .chars()
            .map(|c| {
                if self.filters.contains(c) {
                    self.split.clone()
                } else {
                    c.to_string()
                }
            })
            .collect();
        translated
            .split(self.split.as_str())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Word indices of `text`; unknown words map to the OOV index when one exists.
    pub fn text_to_sequence(&self, text: &str) -> Vec<usize> {
        let oov = self
            .oov_token
            .as_ref()
            .and_then(|token| self.word_index.get(token))
            .copied();
        self.words(text)
            .iter()
            .filter_map(|word| match self.word_index.get(word) {
                Some(&idx) if self.num_words.is_some_and(|limit| idx >= limit) => oov,
                Some(&idx) => Some(idx),
                None => oov,
            })
            .collect()
    }
}

/// Fix a sequence to `max_len`, dropping and padding at the front.
pub fn pad_sequence(sequence: &[usize], max_len: usize) -> Vec<usize> {
    let kept = &sequence[sequence.len().saturating_sub(max_len)..];
    let mut padded = vec![0; max_len - kept.len()];
    padded.extend_from_slice(kept);
    padded
}

/// Forward pass of a trained encoder over one padded index sequence.
pub trait SequenceEncoder: Send + Sync {
    fn encode(&self, sequence: &[usize]) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Tanh,
    Sigmoid,
}

impl Activation {
    fn apply(&self, x: f32) -> f32 {
        match self {
            Self::Linear => x,
            Self::Relu => x.max(0.0),
            Self::Tanh => x.tanh(),
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    #[default]
    Flatten,
    Mean,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DenseLayer {
    /// `[inputs][outputs]`
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    #[serde(default)]
    pub activation: Activation,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct DenseEncoderJson {
    embedding: Vec<Vec<f32>>,
    #[serde(default)]
    pooling: Pooling,
    layers: Vec<DenseLayer>,
}

/// Embedding lookup, pooling, then a stack of dense layers.
#[derive(Debug, Clone)]
pub struct DenseEncoder {
    embedding: Array2<f32>,
    pooling: Pooling,
    layers: Vec<(Array2<f32>, Array1<f32>, Activation)>,
}

impl DenseEncoder {
    pub fn new(embedding: Vec<Vec<f32>>, pooling: Pooling, layers: Vec<DenseLayer>) -> Result<Self> {
        let embedding = to_matrix(embedding)?;
        let layers = layers
            .into_iter()
            .map(|layer| {
                let weights = to_matrix(layer.weights)?;
                if weights.ncols() != layer.bias.len() {
                    return Err(VectorizeError::Model(format!(
                        "dense layer has {} outputs but {} biases",
                        weights.ncols(),
                        layer.bias.len()
                    )));
                }
                Ok((weights, Array1::from(layer.bias), layer.activation))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            embedding,
            pooling,
            layers,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| VectorizeError::artifact(path, e))?;
        let parsed: DenseEncoderJson =
            serde_json::from_str(&raw).map_err(|e| VectorizeError::artifact(path, e))?;
        let encoder = Self::new(parsed.embedding, parsed.pooling, parsed.layers)
            .map_err(|e| VectorizeError::artifact(path, e))?;
        info!(
            path = %path.display(),
            vocab = encoder.embedding.nrows(),
            layers = encoder.layers.len(),
            "loaded dense encoder"
        );
        Ok(encoder)
    }
}

impl SequenceEncoder for DenseEncoder {
    fn encode(&self, sequence: &[usize]) -> Result<Vec<f32>> {
        if let Some(&bad) = sequence.iter().find(|&&idx| idx >= self.embedding.nrows()) {
            return Err(VectorizeError::Model(format!(
                "token index {bad} outside embedding table of {} rows",
                self.embedding.nrows()
            )));
        }
        let embedded = self.embedding.select(Axis(0), sequence);
        let mut hidden: Array1<f32> = match self.pooling {
            Pooling::Flatten => Array1::from_iter(embedded.iter().copied()),
            Pooling::Mean => embedded
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(self.embedding.ncols())),
        };
        for (weights, bias, activation) in &self.layers {
            if hidden.len() != weights.nrows() {
                return Err(VectorizeError::Model(format!(
                    "dense layer expects {} inputs, got {}",
                    weights.nrows(),
                    hidden.len()
                )));
            }
            hidden = (hidden.dot(weights) + bias).mapv(|x| activation.apply(x));
        }
        Ok(hidden.to_vec())
    }
}

fn to_matrix(rows: Vec<Vec<f32>>) -> Result<Array2<f32>> {
    let width = rows.first().map_or(0, Vec::len);
    let height = rows.len();
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((height, width), flat).map_err(|e| VectorizeError::Model(e.to_string()))
}

pub struct EncoderBackend {
    tokenizer: Arc<SequenceTokenizer>,
    encoder: Arc<dyn SequenceEncoder>,
    max_seq_len: usize,
}

impl EncoderBackend {
    pub fn new(
        tokenizer: Arc<SequenceTokenizer>,
        encoder: Arc<dyn SequenceEncoder>,
        max_seq_len: usize,
    ) -> Self {
        Self {
            tokenizer,
            encoder,
            max_seq_len,
        }
    }
}

impl VectorizeBatch for EncoderBackend {
    fn vectorize_batch(&self, batch: &RecordBatch) -> Result<Vec<Option<VectorValue>>> {
        batch
            .rows()
            .iter()
            .map(|row| {
                let sequence = self.tokenizer.text_to_sequence(&row.term);
                let padded = pad_sequence(&sequence, self.max_seq_len);
                self.encoder
                    .encode(&padded)
                    .map(|v| Some(VectorValue::Dense(v)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> SequenceTokenizer {
        let index = [("<oov>", 1), ("muscle", 2), ("pain", 3), ("cramps", 4)]
            .into_iter()
            .map(|(w, i)| (w.to_string(), i))
            .collect();
        SequenceTokenizer::new(index)
    }

    #[test]
    fn filters_split_and_unknown_words_are_dropped() {
        let tok = tokenizer();
        assert_eq!(tok.text_to_sequence("Muscle-pain, severe cramps!"), vec![2, 3, 4]);
    }

    #[test]
    fn oov_token_and_num_words_limit() {
        let mut tok = tokenizer();
        tok.oov_token = Some("<oov>".into());
        tok.num_words = Some(4);
        assert_eq!(tok.text_to_sequence("pain cramps severe"), vec![3, 1, 1]);
    }

    #[test]
    fn keras_json_with_encoded_word_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        let payload = serde_json::json!({
            "class_name": "Tokenizer",
            "config": {
                "num_words": null,
                "filters": DEFAULT_FILTERS,
                "lower": true,
                "split": " ",
                "char_level": false,
                "oov_token": null,
                "word_index": "{\"rash\": 1, \"itchy\": 2}"
            }
        });
        std::fs::write(&path, payload.to_string()).unwrap();
        let tok = SequenceTokenizer::load(&path).unwrap();
        assert_eq!(tok.text_to_sequence("Itchy RASH"), vec![2, 1]);
    }

    #[test]
    fn padding_is_pre_and_truncation_keeps_tail() {
        assert_eq!(pad_sequence(&[5, 6], 4), vec![0, 0, 5, 6]);
        assert_eq!(pad_sequence(&[1, 2, 3, 4, 5], 3), vec![3, 4, 5]);
        assert_eq!(pad_sequence(&[], 2), vec![0, 0]);
    }

    #[test]
    fn dense_encoder_forward_pass() {
        let encoder = DenseEncoder::new(
            vec![vec![0.0, 0.0], vec![1.0, 2.0], vec![3.0, -4.0]],
            Pooling::Mean,
            vec![DenseLayer {
                weights: vec![vec![1.0], vec![1.0]],
                bias: vec![0.5],
                activation: Activation::Relu,
            }],
        )
        .unwrap();
        // mean([1,2],[3,-4]) = [2,-1]; dot -> 1; + 0.5
        assert_eq!(encoder.encode(&[1, 2]).unwrap(), vec![1.5]);
        assert!(encoder.encode(&[7]).is_err());
    }
}

//! Fitted TF-IDF vectorizer artifact and its backend.

use std::{collections::HashMap, fs, path::Path, sync::Arc};

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    data::{RecordBatch, VectorValue},
    error::{Result, VectorizeError},
    nlp::tokenizer::WordTokenizer,
    vectorize::VectorizeBatch,
};

const DEFAULT_TOKEN_PATTERN: &str = r"\b\w\w+\b";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    #[default]
    L2,
    L1,
    None,
}

/// Analyzer and weighting settings of a TF-IDF vectorizer.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TfidfOptions {
    pub lowercase: bool,
    pub token_pattern: String,
    pub ngram_range: (usize, usize),
    pub norm: Norm,
    pub sublinear_tf: bool,
    pub smooth_idf: bool,
}

impl Default for TfidfOptions {
    fn default() -> Self {
        Self {
            lowercase: true,
            token_pattern: DEFAULT_TOKEN_PATTERN.to_string(),
            ngram_range: (1, 1),
            norm: Norm::L2,
            sublinear_tf: false,
            smooth_idf: true,
        }
    }
}

/// Vocabulary plus idf weights, serialised as JSON.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TfidfModel {
    #[serde(default)]
    pub options: TfidfOptions,
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f32>,
    #[serde(skip)]
    pattern: OnceCell<Regex>,
}

impl TfidfModel {
    /// Learn vocabulary and idf weights from `documents`.
    pub fn fit<S: AsRef<str>>(documents: &[S], options: TfidfOptions) -> Result<Self> {
        let pattern = compile(&options.token_pattern)?;
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let mut seen: Vec<String> = analyze(&pattern, &options, doc.as_ref());
            seen.sort();
            seen.dedup();
            for term in seen {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }
        let mut terms: Vec<String> = doc_freq.keys().cloned().collect();
        terms.sort();
        let n = documents.len() as f32;
        let smooth = if options.smooth_idf { 1.0 } else { 0.0 };
        let idf = terms
            .iter()
            .map(|term| {
                let df = doc_freq[term] as f32;
                ((n + smooth) / (df + smooth)).ln() + 1.0
            })
            .collect();
        let vocabulary = terms
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term, idx))
            .collect();
        let model = Self {
            options,
            vocabulary,
            idf,
            pattern: OnceCell::new(),
        };
        model.pattern.set(pattern).ok();
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| VectorizeError::artifact(path, e))?;
        let model: Self =
            serde_json::from_str(&raw).map_err(|e| VectorizeError::artifact(path, e))?;
        if model.idf.len() != model.vocabulary.len()
            || model.vocabulary.values().any(|&idx| idx >= model.idf.len())
        {
            return Err(VectorizeError::artifact(
                path,
                "vocabulary indices do not match idf weights",
            ));
        }
        model
            .pattern
            .set(compile(&model.options.token_pattern)?)
            .ok();
        info!(path = %path.display(), features = model.idf.len(), "loaded tf-idf vectorizer");
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| VectorizeError::artifact(path, e))?;
        }
        let raw = serde_json::to_string(self).map_err(|e| VectorizeError::artifact(path, e))?;
        fs::write(path, raw).map_err(|e| VectorizeError::artifact(path, e))
    }

    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    /// Dense tf-idf row for one document.
    pub fn transform(&self, text: &str) -> Result<Vec<f32>> {
        let pattern = match self.pattern.get() {
            Some(pattern) => pattern,
            None => {
                let compiled = compile(&self.options.token_pattern)?;
                self.pattern.get_or_init(|| compiled)
            }
        };
        let mut row = vec![0.0f32; self.idf.len()];
        for term in analyze(pattern, &self.options, text) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                row[idx] += 1.0;
            }
        }
        for (value, idf) in row.iter_mut().zip(&self.idf) {
            if *value > 0.0 {
                let tf = if self.options.sublinear_tf {
                    1.0 + value.ln()
                } else {
                    *value
                };
                *value = tf * idf;
            }
        }
        normalize(&mut row, self.options.norm);
        Ok(row)
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| VectorizeError::Model(format!("token pattern: {e}")))
}

fn analyze(pattern: &Regex, options: &TfidfOptions, text: &str) -> Vec<String> {
    let text = if options.lowercase {
        text.to_lowercase()
    } else {
        text.to_string()
    };
    let tokens: Vec<&str> = pattern.find_iter(&text).map(|m| m.as_str()).collect();
    let (min_n, max_n) = options.ngram_range;
    let mut terms = Vec::new();
    for n in min_n.max(1)..=max_n {
        for window in tokens.windows(n) {
            terms.push(window.join(" "));
        }
    }
    terms
}

fn normalize(row: &mut [f32], norm: Norm) {
    let total = match norm {
        Norm::L2 => row.iter().map(|v| v * v).sum::<f32>().sqrt(),
        Norm::L1 => row.iter().map(|v| v.abs()).sum::<f32>(),
        Norm::None => return,
    };
    if total > 0.0 {
        row.iter_mut().for_each(|v| *v /= total);
    }
}

pub struct TfidfBackend {
    model: Arc<TfidfModel>,
    tokenizer: Arc<dyn WordTokenizer>,
}

impl TfidfBackend {
    pub fn new(model: Arc<TfidfModel>, tokenizer: Arc<dyn WordTokenizer>) -> Self {
        Self { model, tokenizer }
    }
}

impl VectorizeBatch for TfidfBackend {
    fn vectorize_batch(&self, batch: &RecordBatch) -> Result<Vec<Option<VectorValue>>> {
        batch
            .rows()
            .iter()
            .map(|row| {
                let normalized = self.tokenizer.tokenize(&row.term).join(" ");
                self.model
                    .transform(&normalized)
                    .map(|v| Some(VectorValue::Dense(v)))
            })
            .collect()
    }
}

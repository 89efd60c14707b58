//! Corpus-specific word-vector pretraining (skip-gram with negative sampling).

use std::{collections::HashMap, path::Path, str::FromStr};

use anyhow::Result;
use ndarray::Array2;
use rand::{distributions::WeightedIndex, prelude::Distribution, rngs::StdRng, Rng, SeedableRng};
use tracing::info;

use crate::{
    data::corpus, error::VectorizeError, nlp::tokenizer::WordTokenizer,
    vectorize::word2vec::WordVectors,
};

/// Sentence separator used inside CADEC `text` cells.
const SENTENCE_MARK: &str = "<SENT>";
const UNIGRAM_POWER: f64 = 0.75;

/// Toy corpus used by the `default` pretraining target.
pub const COMMON_TEXTS: &[&[&str]] = &[
    &["human", "interface", "computer"],
    &["survey", "user", "computer", "system", "response", "time"],
    &["eps", "user", "interface", "system"],
    &["system", "human", "system", "eps"],
    &["user", "response", "time"],
    &["trees"],
    &["graph", "trees"],
    &["graph", "minors", "trees"],
    &["graph", "minors", "survey"],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PretrainCorpus {
    Default,
    Cadec,
}

impl FromStr for PretrainCorpus {
    type Err = VectorizeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "default" => Ok(Self::Default),
            "cadec" => Ok(Self::Cadec),
            other => Err(VectorizeError::UnknownCorpus(other.to_string())),
        }
    }
}

/// Hyper-parameters of the skip-gram trainer.
#[derive(Debug, Clone, PartialEq)]
pub struct PretrainOptions {
    pub size: usize,
    pub window: usize,
    pub epochs: usize,
    pub negative: usize,
    pub min_count: usize,
    pub learning_rate: f32,
    pub seed: u64,
}

impl Default for PretrainOptions {
    fn default() -> Self {
        Self {
            size: 100,
            window: 5,
            epochs: 5,
            negative: 5,
            min_count: 1,
            learning_rate: 0.025,
            seed: 1,
        }
    }
}

/// Tokenized sentences for `corpus`.
pub fn corpus_sentences(
    corpus: PretrainCorpus,
    data_dir: &Path,
    tokenizer: &dyn WordTokenizer,
) -> Result<Vec<Vec<String>>> {
    match corpus {
        PretrainCorpus::Default => Ok(COMMON_TEXTS
            .iter()
            .map(|sentence| sentence.iter().map(|w| w.to_string()).collect())
            .collect()),
        PretrainCorpus::Cadec => {
            let path = data_dir.join("interim/cadec/test.csv");
            let texts = corpus::load_texts(&path)?;
            Ok(texts
                .iter()
                .flat_map(|text| text.split(SENTENCE_MARK))
                .map(|sentence| tokenizer.tokenize(sentence))
                .filter(|tokens| !tokens.is_empty())
                .collect())
        }
    }
}

struct Vocab {
    words: Vec<String>,
    ids: HashMap<String, usize>,
    counts: Vec<usize>,
}

fn build_vocab(sentences: &[Vec<String>], min_count: usize) -> Vocab {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in sentences.iter().flatten() {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }
    let mut entries: Vec<(&str, usize)> = counts
        .into_iter()
        .filter(|(_, count)| *count >= min_count)
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let words: Vec<String> = entries.iter().map(|(w, _)| w.to_string()).collect();
    let ids = words
        .iter()
        .enumerate()
        .map(|(idx, w)| (w.clone(), idx))
        .collect();
    let counts = entries.into_iter().map(|(_, c)| c).collect();
    Vocab { words, ids, counts }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Train skip-gram word vectors on `sentences`.
pub fn train(sentences: &[Vec<String>], options: &PretrainOptions) -> Result<WordVectors> {
    let vocab = build_vocab(sentences, options.min_count.max(1));
    let dim = options.size;
    if vocab.words.is_empty() || dim == 0 {
        return Ok(WordVectors::from_matrix(Vec::new(), Array2::zeros((0, dim))));
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let bound = 0.5 / dim as f32;
    let mut input = Array2::from_shape_fn((vocab.words.len(), dim), |_| rng.gen_range(-bound..bound));
    let mut output = Array2::<f32>::zeros((vocab.words.len(), dim));
    let noise = WeightedIndex::new(
        vocab
            .counts
            .iter()
            .map(|&c| (c as f64).powf(UNIGRAM_POWER)),
    )?;

    let encoded: Vec<Vec<usize>> = sentences
        .iter()
        .map(|s| s.iter().filter_map(|w| vocab.ids.get(w).copied()).collect())
        .collect();
    let total_steps = (options.epochs * encoded.iter().map(Vec::len).sum::<usize>()).max(1);
    let mut step = 0usize;
    let mut grad = vec![0.0f32; dim];

    for _ in 0..options.epochs {
        for sentence in &encoded {
            for (pos, &center) in sentence.iter().enumerate() {
                let progress = step as f32 / total_steps as f32;
                let lr = (options.learning_rate * (1.0 - progress)).max(options.learning_rate * 1e-4);
                step += 1;
                let reach = rng.gen_range(1..=options.window.max(1));
                let lo = pos.saturating_sub(reach);
                let hi = (pos + reach).min(sentence.len() - 1);
                for ctx_pos in lo..=hi {
                    if ctx_pos == pos {
                        continue;
                    }
                    let context = sentence[ctx_pos];
                    grad.iter_mut().for_each(|g| *g = 0.0);
                    for n in 0..=options.negative {
                        let (target, label) = if n == 0 {
                            (context, 1.0)
                        } else {
                            let sample = noise.sample(&mut rng);
                            if sample == context {
                                continue;
                            }
                            (sample, 0.0)
                        };
                        let score = sigmoid(input.row(center).dot(&output.row(target)));
                        let g = lr * (label - score);
                        for (acc, &o) in grad.iter_mut().zip(output.row(target)) {
                            *acc += g * o;
                        }
                        let center_row = input.row(center).to_owned();
                        output.row_mut(target).scaled_add(g, &center_row);
                    }
                    for (value, g) in input.row_mut(center).iter_mut().zip(&grad) {
                        *value += g;
                    }
                }
            }
        }
    }
    info!(words = vocab.words.len(), dim, epochs = options.epochs, "trained word vectors");
    Ok(WordVectors::from_matrix(vocab.words, input))
}

/// Load the corpus, train, and persist vectors in word2vec text format.
pub fn pretrain(
    corpus: &str,
    data_dir: &Path,
    tokenizer: &dyn WordTokenizer,
    options: &PretrainOptions,
    output: &Path,
) -> Result<WordVectors> {
    let corpus: PretrainCorpus = corpus.parse()?;
    let sentences = corpus_sentences(corpus, data_dir, tokenizer)?;
    info!(?corpus, sentences = sentences.len(), "pretraining word vectors");
    let vectors = train(&sentences, options)?;
    vectors.save_text(output)?;
    info!(path = %output.display(), "saved word vectors");
    Ok(vectors)
}

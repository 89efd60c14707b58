//! Runtime configuration utilities for adr-vectorizer.

use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, Context};

use crate::{
    nlp::aggregate::{Aggregation, SpanPooling},
    vectorize::{encoder::DEFAULT_MAX_SEQ_LEN, ArtifactPaths},
};

/// Application configuration resolved from `.env` and defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root folder for corpora and label vocabularies.
    pub data_dir: PathBuf,
    /// Root folder for pretrained artefacts.
    pub models_dir: PathBuf,
    /// Root folder for vectorized batches and experiment runs.
    pub outputs_dir: PathBuf,
    /// Strategy used by `run` when none is given on the command line.
    pub sentence_vectorizer: String,
    /// Word-vector aggregation for the FastText/Word2Vec backends.
    pub agg_type: Aggregation,
    /// Pooling of attributed transformer states.
    pub span_pooling: SpanPooling,
    /// Word tokenizer name.
    pub tokenizer_name: String,
    /// Requested parallelism; recorded, not used by the vectorizers.
    pub n_jobs: usize,
    /// Dimensionality for pretrained word vectors.
    pub vec_size: usize,
    /// Padded sequence length fed to the encoder.
    pub max_seq_len: usize,
    /// Rows read per corpus split during experiments.
    pub row_limit: usize,
    pub ft_model_path: PathBuf,
    pub w2v_model_path: PathBuf,
    pub tfidf_path: PathBuf,
    pub encoder_model_path: PathBuf,
    pub encoder_tokenizer_path: PathBuf,
    pub transformers_dir: PathBuf,
    pub labels_path: PathBuf,
}

/// Parse `raw` for `key`; `default` only when the variable is unset.
fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| anyhow!("`{value}`: {e}"))
            .with_context(|| format!("invalid {key}")),
    }
}

fn var_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_or(key, env::var(key).ok(), default)
}

fn path_or(key: &str, default: PathBuf) -> PathBuf {
    env::var(key).map(PathBuf::from).unwrap_or(default)
}

impl Settings {
    /// Load configuration from environment with reasonable defaults.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let data_dir = path_or("DATA_DIR", PathBuf::from("./data"));
        let models_dir = path_or("MODELS_DIR", PathBuf::from("./models"));
        let outputs_dir = path_or("OUTPUTS_DIR", PathBuf::from("./outputs"));

        std::fs::create_dir_all(&data_dir).context("creating data dir")?;
        std::fs::create_dir_all(&outputs_dir).context("creating outputs dir")?;

        Ok(Self {
            sentence_vectorizer: env::var("SENTENCE_VECTORIZER")
                .unwrap_or_else(|_| "fasttext_facebook".to_string()),
            agg_type: var_or("AGG_TYPE", Aggregation::Avg)?,
            span_pooling: var_or("SPAN_POOLING", SpanPooling::Mean)?,
            tokenizer_name: env::var("TOKENIZER_NAME").unwrap_or_else(|_| "regex".to_string()),
            n_jobs: var_or("N_JOBS", 5)?,
            vec_size: var_or("VEC_SIZE", 100)?,
            max_seq_len: var_or("MAX_SEQ_LEN", DEFAULT_MAX_SEQ_LEN)?,
            row_limit: var_or("ROW_LIMIT", 150)?,
            ft_model_path: path_or(
                "FT_MODEL_PATH",
                data_dir.join("external/embeddings/cc.en.300.bin"),
            ),
            w2v_model_path: path_or(
                "W2V_MODEL_PATH",
                data_dir.join("external/embeddings/pubmed2018_w2v_200D/pubmed2018_w2v_200D.bin"),
            ),
            tfidf_path: path_or("TFIDF_PATH", models_dir.join("tfidfvectorizer/vectorizer.json")),
            encoder_model_path: path_or(
                "ENCODER_MODEL_PATH",
                models_dir.join("encoder/encoder_cadec.json"),
            ),
            encoder_tokenizer_path: path_or(
                "ENCODER_TOKENIZER_PATH",
                models_dir.join("encoder/tokenizer.json"),
            ),
            transformers_dir: path_or("TRANSFORMERS_DIR", models_dir.join("transformers")),
            labels_path: path_or(
                "LABELS_PATH",
                data_dir.join("interim/meddra_codes_terms_synonims.csv"),
            ),
            data_dir,
            models_dir,
            outputs_dir,
        })
    }

    /// Convenience helper for derived path segments.
    pub fn join_data<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.data_dir.join(path)
    }

    /// Convenience helper for derived output path segments.
    pub fn join_output<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.outputs_dir.join(path)
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            fasttext: self.ft_model_path.clone(),
            word2vec: self.w2v_model_path.clone(),
            tfidf: self.tfidf_path.clone(),
            encoder_model: self.encoder_model_path.clone(),
            encoder_tokenizer: self.encoder_tokenizer_path.clone(),
            transformers_dir: self.transformers_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variable_uses_default() {
        let agg = parse_or("AGG_TYPE", None, Aggregation::Max).unwrap();
        assert_eq!(agg, Aggregation::Max);
    }

    #[test]
    fn set_variable_is_parsed() {
        let pooling = parse_or("SPAN_POOLING", Some("sum".into()), SpanPooling::Mean).unwrap();
        assert_eq!(pooling, SpanPooling::Sum);
        assert_eq!(parse_or("MAX_SEQ_LEN", Some(" 12 ".into()), 10usize).unwrap(), 12);
    }

    #[test]
    fn unparsable_variable_is_an_error() {
        let err = parse_or("AGG_TYPE", Some("median".into()), Aggregation::Avg).unwrap_err();
        assert_eq!(err.to_string(), "invalid AGG_TYPE");
        assert!(format!("{err:#}").contains("median"));
        assert!(parse_or("SPAN_POOLING", Some("summ".into()), SpanPooling::Mean).is_err());
        assert!(parse_or("MAX_SEQ_LEN", Some("ten".into()), 10usize).is_err());
    }
}

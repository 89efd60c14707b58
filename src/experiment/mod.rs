//! Train/test experiment loop over the benchmark corpora.

pub mod classifier;
pub mod search;
pub mod tracker;

use std::{fs, path::Path};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use ndarray::Array1;
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::{
    config::Settings,
    data::{
        corpus::{self, CorpusSplit},
        labels::LabelIndex,
        RecordBatch,
    },
    experiment::{
        classifier::{design_matrix, Trainer, MODEL_NAME},
        search::{SampledConfig, SampledParams},
        tracker::{ExperimentTracker, FileTracker, RunStatus},
    },
    vectorize::{SentenceVectorizer, Strategy},
};

/// Published accuracy ranges the runs are compared against.
const REFERENCE_SCORES: &str = "SMM4H17: 65, 87-90, 97.73; SMM4H21(20): 36-37, 42-44, 43-45; \
CADEC: 72.72, 70-83, 86.4, 86.93; PsyTar: 74.39, 77-82, 85.04, 87.7";

const TOP_K: [usize; 3] = [1, 2, 3];

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub experiment: String,
    pub run_name: String,
    pub strategy: Strategy,
    pub row_limit: usize,
    /// Set when the run configuration was drawn by the random search.
    pub sampled: Option<SampledConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub corpus: String,
    pub status: RunStatus,
    pub metrics: IndexMap<String, f64>,
}

#[derive(Debug, Serialize)]
struct RunConfigArtifact<'a> {
    vectorizer: &'a str,
    tokenizer: &'a str,
    agg_type: &'a str,
    span_pooling: &'a str,
    max_seq_len: usize,
    n_jobs: usize,
    row_limit: usize,
    random_search: Option<SampledParams>,
}

/// Vectors and class ids of the rows usable for training or scoring.
pub struct LabelledSet {
    pub x: ndarray::Array2<f64>,
    pub y: Vec<usize>,
}

/// Keep rows with a dense vector and a code known to `labels`.
pub fn labelled(batch: &RecordBatch, labels: &LabelIndex) -> Result<LabelledSet> {
    let mut vectors = Vec::new();
    let mut y = Vec::new();
    let mut skipped = 0usize;
    for row in batch.rows() {
        let id = row.code.as_deref().and_then(|code| labels.id(code));
        match (row.dense(), id) {
            (Some(vector), Some(id)) => {
                vectors.push(vector);
                y.push(id);
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "rows without vector or known code");
    }
    Ok(LabelledSet {
        x: design_matrix(&vectors)?,
        y,
    })
}

/// Vectorize, fit and score one train/test pair, logging into `tracker`.
#[instrument(skip_all, fields(corpus = %split.name, strategy = %config.strategy))]
pub fn run_pipe(
    vectorizer: &SentenceVectorizer,
    labels: &LabelIndex,
    split: &CorpusSplit,
    config: &RunConfig,
    tracker: &mut dyn ExperimentTracker,
) -> Result<IndexMap<String, f64>> {
    let mut train = corpus::load_records(&split.train, Some(config.row_limit))?;
    info!(rows = train.len(), "vectorizing train split");
    train = vectorizer.vectorize_with(train, config.strategy)?;
    train.drop_non_dense();
    let train = labelled(&train, labels)?;

    let mut trainer = Trainer::default();
    trainer
        .train(train.x, Array1::from(train.y))
        .context("fitting classifier")?;

    let test = corpus::load_records(&split.test, Some(config.row_limit))?;
    info!(rows = test.len(), "vectorizing test split");
    let mut test = vectorizer.vectorize_with(test, config.strategy)?;
    test.drop_non_dense();
    let test = labelled(&test, labels)?;

    tracker.log_param("train corpus", &split.name);
    tracker.log_param("test corpus", &split.name);
    tracker.log_param("vectorizer", config.strategy.as_str());
    tracker.log_param("model_name", MODEL_NAME);
    tracker.log_param("n_jobs", &vectorizer.n_jobs().to_string());
    if let Some(sampled) = &config.sampled {
        let params = sampled.params();
        tracker.log_param("seed", &params.seed.to_string());
        tracker.log_param("agg_type", params.agg_type);
        tracker.log_param("span_pooling", params.span_pooling);
        tracker.log_param("tokenizer", params.tokenizer);
    }
    tracker.log_param(
        "model_params",
        &serde_json::to_string(&trainer.params()).unwrap_or_default(),
    );

    let mut metrics = IndexMap::new();
    for k in TOP_K {
        let score = trainer.accuracy(&test.x, &test.y, k)?;
        info!(k, score, "test accuracy");
        tracker.log_metric(&format!("accuracy_{k}"), score);
        metrics.insert(format!("accuracy_{k}"), score);
    }
    tracker.set_tag("exp_name", &config.experiment);
    Ok(metrics)
}

fn write_log(run_dir: &Path, lines: &[String]) -> Result<std::path::PathBuf> {
    let path = run_dir.join("run.log");
    fs::write(&path, lines.join("\n")).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Run every benchmark corpus through `run_pipe`, one tracked run each.
///
/// A failing corpus is recorded as a failed run and does not stop the others.
pub fn run_experiment(
    settings: &Settings,
    vectorizer: &SentenceVectorizer,
    labels: &LabelIndex,
    config: &RunConfig,
) -> Result<Vec<RunSummary>> {
    let tracking_root = settings.join_output("runs");
    let config_path = settings.join_output(format!("tmp/run_config_{}.json", config.run_name));
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let artifact = RunConfigArtifact {
        vectorizer: config.strategy.as_str(),
        tokenizer: &settings.tokenizer_name,
        agg_type: settings.agg_type.as_str(),
        span_pooling: settings.span_pooling.as_str(),
        max_seq_len: settings.max_seq_len,
        n_jobs: settings.n_jobs,
        row_limit: config.row_limit,
        random_search: config.sampled.map(|sampled| sampled.params()),
    };
    fs::write(&config_path, serde_json::to_string_pretty(&artifact)?)?;

    let mut summaries = Vec::new();
    for split in corpus::discover(&settings.join_data("interim"))? {
        let mut tracker = FileTracker::start(&tracking_root, &config.experiment, &config.run_name)?;
        tracker.set_tag("reference_scores", REFERENCE_SCORES);
        tracker.log_artifact(&config_path)?;

        let outcome = run_pipe(vectorizer, labels, &split, config, &mut tracker);
        let (status, metrics, log_lines) = match outcome {
            Ok(metrics) => {
                let lines = metrics
                    .iter()
                    .map(|(name, value)| format!("{}: {name} = {value:.4}", split.name))
                    .collect();
                (RunStatus::Finished, metrics, lines)
            }
            Err(err) => {
                error!(corpus = %split.name, error = ?err, "run failed");
                tracker.set_tag("LOG_STATUS", "FAILED RUN");
                let lines = vec![
                    format!("ERROR FOR RUN: {}", tracker.record().run_id),
                    format!("{err:?}"),
                ];
                (RunStatus::Failed, IndexMap::new(), lines)
            }
        };
        let log_path = write_log(tracker.run_dir(), &log_lines)?;
        tracker.log_artifact(&log_path)?;
        tracker.end_run(status)?;
        summaries.push(RunSummary {
            corpus: split.name.clone(),
            status,
            metrics,
        });
    }

    fs::remove_file(&config_path).ok();
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Record, VectorValue};

    #[test]
    fn labelled_skips_unknown_codes_and_raw_vectors() {
        let labels = LabelIndex::from_codes(["10019211", "10037844"]);
        let mut batch = RecordBatch::new(vec![
            Record::new("headache").with_code("10019211"),
            Record::new("rash").with_code("10037844"),
            Record::new("nausea").with_code("10028813"),
            Record::new("itch").with_code("10037844"),
            Record::new("dizzy"),
        ]);
        batch.append_vectors(
            "term",
            vec![
                Some(VectorValue::Dense(vec![1.0, 0.0])),
                Some(VectorValue::Dense(vec![0.0, 1.0])),
                Some(VectorValue::Dense(vec![1.0, 1.0])),
                Some(VectorValue::Raw("itch".into())),
                Some(VectorValue::Dense(vec![0.5, 0.5])),
            ],
        );

        let set = labelled(&batch, &labels).unwrap();
        assert_eq!(set.x.dim(), (2, 2));
        assert_eq!(set.y, vec![0, 1]);
    }
}

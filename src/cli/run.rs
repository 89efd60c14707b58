//! CLI entry-point for the benchmark experiment loop.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{
    config::Settings,
    data::labels::LabelIndex,
    experiment::{self, search::SampledConfig, RunConfig},
    vectorize::{ArtifactLoader, SentenceVectorizer, Strategy},
};

/// Args for the `run` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    #[arg(long, default_value = "test baseline run")]
    pub experiment_name: String,
    #[arg(long, default_value = "default")]
    pub run_name: String,
    /// Strategy name; defaults to `SENTENCE_VECTORIZER`.
    #[arg(long, conflicts_with = "random_config")]
    pub strategy: Option<String>,
    /// Draw strategy, aggregation, pooling and tokenizer at random.
    #[arg(long)]
    pub random_config: bool,
    /// Seed for `--random-config`; a fresh one is drawn when omitted.
    #[arg(long, requires = "random_config")]
    pub seed: Option<u64>,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, mut settings: Settings) -> Result<()> {
    let sampled = args
        .random_config
        .then(|| SampledConfig::sample(args.seed.unwrap_or_else(rand::random)));
    if let Some(sampled) = &sampled {
        sampled.apply(&mut settings);
    }
    let strategy: Strategy = args
        .strategy
        .as_deref()
        .unwrap_or(&settings.sentence_vectorizer)
        .parse()?;
    let config = RunConfig {
        experiment: args.experiment_name,
        run_name: args.run_name,
        strategy,
        row_limit: settings.row_limit,
        sampled,
    };

    let summaries = tokio::task::spawn_blocking(move || -> Result<_> {
        let labels = LabelIndex::load(&settings.labels_path)?;
        let vectorizer = SentenceVectorizer::new(ArtifactLoader::from_settings(&settings)?)
            .with_n_jobs(settings.n_jobs);
        experiment::run_experiment(&settings, &vectorizer, &labels, &config)
    })
    .await??;

    for summary in &summaries {
        info!(corpus = %summary.corpus, status = ?summary.status, metrics = ?summary.metrics, "run summary");
    }
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

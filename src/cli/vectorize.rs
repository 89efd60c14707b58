//! CLI entry-point vectorizing a CSV of terms into parquet.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{
    config::Settings,
    data::corpus,
    vectorize::{ArtifactLoader, SentenceVectorizer},
};

/// Args for the `vectorize` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// CSV with a `term` column and optional `text`/`code` columns.
    #[arg(long)]
    pub input: PathBuf,
    /// Strategy name; defaults to `SENTENCE_VECTORIZER`.
    #[arg(long)]
    pub strategy: Option<String>,
    /// Parquet destination; defaults to `<outputs>/vectors/<strategy>.parquet`.
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Maximum rows to read.
    #[arg(long)]
    pub limit: Option<usize>,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let strategy = args
        .strategy
        .clone()
        .unwrap_or_else(|| settings.sentence_vectorizer.clone());
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| settings.join_output(format!("vectors/{strategy}.parquet")));

    tokio::task::spawn_blocking(move || -> Result<()> {
        let batch = corpus::load_records(&args.input, args.limit)?;
        let vectorizer = SentenceVectorizer::new(ArtifactLoader::from_settings(&settings)?)
            .with_n_jobs(settings.n_jobs);
        let batch = vectorizer
            .vectorize(batch, &strategy)
            .with_context(|| format!("vectorizing with {strategy}"))?;
        corpus::write_parquet(&batch, &output)?;
        info!(rows = batch.len(), width = ?batch.dense_width(), path = %output.display(), "wrote vectors");
        Ok(())
    })
    .await?
}

//! CLI entry-point fitting the TF-IDF vocabulary.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{
    config::Settings,
    data::corpus,
    nlp::tokenizer,
    vectorize::tfidf::{TfidfModel, TfidfOptions},
};

/// Args for the `fit-tfidf` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// CSV whose `term` column is the fitting corpus.
    #[arg(long)]
    pub input: PathBuf,
    /// Destination; defaults to `TFIDF_PATH`.
    #[arg(long)]
    pub output: Option<PathBuf>,
    #[arg(long, default_value_t = 1)]
    pub min_ngram: usize,
    #[arg(long, default_value_t = 1)]
    pub max_ngram: usize,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    if args.min_ngram == 0 || args.min_ngram > args.max_ngram {
        bail!("invalid n-gram range {}..={}", args.min_ngram, args.max_ngram);
    }
    let output = args.output.clone().unwrap_or_else(|| settings.tfidf_path.clone());
    tokio::task::spawn_blocking(move || -> Result<()> {
        let tokenizer = tokenizer::from_name(&settings.tokenizer_name)?;
        let batch = corpus::load_records(&args.input, None)?;
        let documents: Vec<String> = batch
            .rows()
            .iter()
            .map(|row| tokenizer.tokenize(&row.term).join(" "))
            .collect();
        let options = TfidfOptions {
            ngram_range: (args.min_ngram, args.max_ngram),
            ..TfidfOptions::default()
        };
        let model = TfidfModel::fit(&documents[..], options)?;
        model.save(&output)?;
        info!(features = model.n_features(), path = %output.display(), "saved tfidf model");
        Ok(())
    })
    .await?
}

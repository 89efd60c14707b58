//! CLI entry-point for word-vector pretraining.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{
    config::Settings,
    nlp::tokenizer,
    pretrain::{self, PretrainOptions},
};

/// Args for the `pretrain` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Corpus name: `default` or `cadec`.
    #[arg(long, default_value = "default")]
    pub corpus: String,
    /// Vector size; defaults to `VEC_SIZE`.
    #[arg(long)]
    pub size: Option<usize>,
    #[arg(long, default_value_t = 5)]
    pub epochs: usize,
    #[arg(long, default_value_t = 5)]
    pub window: usize,
    #[arg(long, default_value_t = 1)]
    pub seed: u64,
    /// Destination; defaults to `<models>/word2vec/<corpus>.txt`.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let options = PretrainOptions {
        size: args.size.unwrap_or(settings.vec_size),
        epochs: args.epochs,
        window: args.window,
        seed: args.seed,
        ..PretrainOptions::default()
    };
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| settings.models_dir.join(format!("word2vec/{}.txt", args.corpus)));

    let vectors = tokio::task::spawn_blocking(move || -> Result<_> {
        let tokenizer = tokenizer::from_name(&settings.tokenizer_name)?;
        pretrain::pretrain(
            &args.corpus,
            &settings.data_dir,
            tokenizer.as_ref(),
            &options,
            &output,
        )
    })
    .await??;
    info!(words = vectors.len(), "pretraining finished");
    Ok(())
}

//! Command-line interface wiring for adr-vectorizer.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Settings;

pub mod fetch;
pub mod fit_tfidf;
pub mod pretrain;
pub mod run;
pub mod strategies;
pub mod vectorize;

/// Top-level CLI definition.
#[derive(Debug, Parser)]
#[command(author, version, about = "ADR term vectorization experiments", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parse CLI arguments from the environment.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Dispatch the selected sub-command.
    pub async fn dispatch(self, settings: Settings) -> Result<()> {
        match self.command {
            Commands::Strategies => strategies::run(settings).await,
            Commands::Vectorize(args) => vectorize::run(args, settings).await,
            Commands::Run(args) => run::run(args, settings).await,
            Commands::Pretrain(args) => pretrain::run(args, settings).await,
            Commands::FitTfidf(args) => fit_tfidf::run(args, settings).await,
            Commands::FetchModel(args) => fetch::run(args, settings).await,
        }
    }
}

/// Supported sub-commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the supported vectorization strategies.
    Strategies,
    /// Vectorize the `term` column of a CSV file.
    Vectorize(vectorize::Args),
    /// Train and score a classifier on every benchmark corpus.
    Run(run::Args),
    /// Pretrain word vectors on a named corpus.
    Pretrain(pretrain::Args),
    /// Fit a TF-IDF vocabulary on a CSV column.
    FitTfidf(fit_tfidf::Args),
    /// Download a transformer's tokenizer and ONNX export.
    FetchModel(fetch::Args),
}

//! CLI entry-point downloading transformer artefacts.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{config::Settings, data::hub, vectorize::Strategy};

/// Args for the `fetch-model` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Hub model id, or a transformer strategy name such as `bert-PubMed`.
    #[arg(long)]
    pub model_id: String,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let model_id = args
        .model_id
        .parse::<Strategy>()
        .ok()
        .and_then(|strategy| strategy.transformer_id())
        .unwrap_or(args.model_id.as_str());
    let dir = hub::fetch_model(model_id, &settings.transformers_dir).await?;
    info!(%model_id, path = %dir.display(), "model ready");
    Ok(())
}

//! CLI entry-point listing strategy names.

use anyhow::Result;
use tracing::instrument;

use crate::{config::Settings, vectorize};

#[instrument(skip(_settings))]
pub async fn run(_settings: Settings) -> Result<()> {
    for name in vectorize::list_strategies() {
        println!("{name}");
    }
    Ok(())
}

//! Downloads transformer artefacts from the Hugging Face hub.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use tracing::{info, warn};

const HUB_URL: &str = "https://huggingface.co";
/// Files the span-context backend expects in each model directory.
pub const MODEL_FILES: &[&str] = &["tokenizer.json", "model.onnx"];
/// Some repositories keep their ONNX export under `onnx/`.
const ONNX_FALLBACK: &str = "onnx/model.onnx";

fn file_url(model_id: &str, file: &str) -> String {
    format!("{HUB_URL}/{model_id}/resolve/main/{file}")
}

/// Fetch `MODEL_FILES` for `model_id` into `<root>/<model_id>/`, skipping cached files.
pub async fn fetch_model(model_id: &str, root: &Path) -> Result<PathBuf> {
    let client = Client::builder()
        .user_agent(concat!("adr-vectorizer/", env!("CARGO_PKG_VERSION")))
        .gzip(true)
        .build()?;

    let dest_dir = root.join(model_id);
    tokio::fs::create_dir_all(&dest_dir)
        .await
        .with_context(|| format!("create {dest_dir:?}"))?;

    for file in MODEL_FILES {
        let dest = dest_dir.join(file);
        if dest.exists() {
            info!(%model_id, file, "using cached model file");
            continue;
        }
        let mut candidates = vec![file_url(model_id, file)];
        if *file == "model.onnx" {
            candidates.push(file_url(model_id, ONNX_FALLBACK));
        }
        download_first(&client, &candidates, &dest).await?;
    }
    Ok(dest_dir)
}

async fn download_first(client: &Client, urls: &[String], dest: &Path) -> Result<()> {
    for url in urls {
        info!(%url, "attempting model download");
        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let bytes = resp.bytes().await?;
                tokio::fs::write(dest, &bytes)
                    .await
                    .with_context(|| format!("write {dest:?}"))?;
                info!(?dest, size = bytes.len(), "downloaded model file");
                return Ok(());
            }
            Ok(resp) => warn!(status = %resp.status(), %url, "download failed, trying next location"),
            Err(err) => warn!(%err, %url, "download error"),
        }
    }
    Err(anyhow!("unable to download {}", dest.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_point_at_main_revision() {
        assert_eq!(
            file_url("vinai/bertweet-base", "tokenizer.json"),
            "https://huggingface.co/vinai/bertweet-base/resolve/main/tokenizer.json"
        );
    }
}

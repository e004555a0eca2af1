pub mod context;
pub mod doctor;
pub mod import;
pub mod search;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio::io::AsyncWriteExt;

const HF_BASE: &str = "https://huggingface.co/sentence-transformers";

/// Files the local provider loads, as (remote path, local file name).
const MODEL_FILES: &[(&str, &str)] = &[
    ("onnx/model.onnx", "model.onnx"),
    ("tokenizer.json", "tokenizer.json"),
];

fn file_url(model: &str, remote_path: &str) -> String {
    format!("{HF_BASE}/{model}/resolve/main/{remote_path}")
}

/// Download the configured ONNX embedding model and tokenizer into the cache directory.
pub async fn model_download(config: &crate::config::EmbeddingConfig) -> Result<()> {
    let cache_dir = crate::config::expand_tilde(&config.cache_dir);
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    for (remote_path, file_name) in MODEL_FILES {
        let dest = cache_dir.join(file_name);
        if dest.exists() {
            println!("{file_name} already present at {}", dest.display());
            continue;
        }
        println!("Downloading {file_name} for {}...", config.model);
        download_file(&file_url(&config.model, remote_path), &dest).await?;
        println!("Saved {}", dest.display());
    }

    println!("Model ready. Semantic reranking will be available on next start.");
    Ok(())
}

/// Stream `url` into `dest` via a temp file so a partial download never
/// looks like a model.
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")?
                    .progress_chars("##-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk).await.context("error writing to file")?;
        written += chunk.len() as u64;
        pb.inc(chunk.len() as u64);
    }
    file.flush().await?;
    drop(file);

    anyhow::ensure!(written > 0, "download of {url} was empty");
    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}

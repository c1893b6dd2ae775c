//! Fine-tuning submission.
//!
//! Narrow collaborator interface: hand a published dataset snapshot to a
//! provider and return the opaque job handle. The pipeline neither polls nor
//! interprets job status — that belongs to the provider's own tooling.
//!
//! Providers are selected by the `fine_tuning.provider` config string:
//! - **disabled** — returns errors; the default.
//! - **openai** — uploads `train.jsonl`/`validation.jsonl` to the files API
//!   and creates a fine-tuning job. Requires `OPENAI_API_KEY`.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;

/// Submit a snapshot, resolving the newest one when none is given.
pub async fn run_submit(config: &Config, snapshot: Option<PathBuf>) -> Result<()> {
    let snapshot_dir = match snapshot {
        Some(dir) => dir,
        None => latest_snapshot(&config.dataset.output_dir)?,
    };

    let job_id = submit_snapshot(config, &snapshot_dir).await?;

    println!("submit");
    println!("  snapshot: {}", snapshot_dir.display());
    println!("  provider: {}", config.fine_tuning.provider);
    println!("  job: {}", job_id);
    println!("ok");
    Ok(())
}

/// Submit one snapshot directory to the configured provider and return the
/// provider's job handle.
pub async fn submit_snapshot(config: &Config, snapshot_dir: &Path) -> Result<String> {
    match config.fine_tuning.provider.as_str() {
        "openai" => submit_openai(config, snapshot_dir).await,
        "disabled" => bail!("Fine-tuning provider is disabled"),
        other => bail!("Unknown fine-tuning provider: {}", other),
    }
}

/// Newest published snapshot: version names start with a UTC timestamp, so
/// lexicographic order is chronological.
fn latest_snapshot(output_dir: &Path) -> Result<PathBuf> {
    let mut versions: Vec<PathBuf> = std::fs::read_dir(output_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .map(|n| !n.to_string_lossy().starts_with('.'))
                    .unwrap_or(false)
        })
        .collect();
    versions.sort();

    versions
        .pop()
        .ok_or_else(|| anyhow::anyhow!("No snapshots found in {}", output_dir.display()))
}

async fn submit_openai(config: &Config, snapshot_dir: &Path) -> Result<String> {
    let tuning = &config.fine_tuning;
    let model = tuning
        .model
        .clone()
        .ok_or_else(|| anyhow::anyhow!("fine_tuning.model required for OpenAI provider"))?;
    let api_key = match std::env::var("OPENAI_API_KEY") {
        Ok(key) => key,
        Err(_) => bail!("OPENAI_API_KEY environment variable not set"),
    };

    let train_path = snapshot_dir.join("train.jsonl");
    if !train_path.exists() {
        bail!("Snapshot has no train.jsonl: {}", snapshot_dir.display());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(tuning.timeout_secs))
        .build()?;

    let training_file = upload_file(&client, &tuning.base_url, &api_key, &train_path).await?;

    let validation_path = snapshot_dir.join("validation.jsonl");
    let validation_file = if validation_path.exists()
        && std::fs::metadata(&validation_path)?.len() > 0
    {
        Some(upload_file(&client, &tuning.base_url, &api_key, &validation_path).await?)
    } else {
        None
    };

    let mut body = serde_json::json!({
        "training_file": training_file,
        "model": model,
    });
    if let Some(id) = &validation_file {
        body["validation_file"] = serde_json::json!(id);
    }
    if let Some(epochs) = tuning.n_epochs {
        body["hyperparameters"] = serde_json::json!({ "n_epochs": epochs });
    }

    let response = client
        .post(format!("{}/v1/fine_tuning/jobs", tuning.base_url))
        .bearer_auth(&api_key)
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    let payload: serde_json::Value = response.json().await?;
    if !status.is_success() {
        bail!("Fine-tuning job creation failed ({}): {}", status, payload);
    }

    payload["id"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("No job id in fine-tuning response: {}", payload))
}

/// Upload one JSONL file with purpose `fine-tune`, returning the file id.
async fn upload_file(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    path: &Path,
) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "train.jsonl".to_string());

    let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
    let form = reqwest::multipart::Form::new()
        .text("purpose", "fine-tune")
        .part("file", part);

    let response = client
        .post(format!("{}/v1/files", base_url))
        .bearer_auth(api_key)
        .multipart(form)
        .send()
        .await?;

    let status = response.status();
    let payload: serde_json::Value = response.json().await?;
    if !status.is_success() {
        bail!("File upload failed ({}): {}", status, payload);
    }

    payload["id"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("No file id in upload response: {}", payload))
}

//! Shared plumbing for talking to an Ollama runtime.
//!
//! Both the embedding client and the chat model client go through
//! [`post_json`], which applies the configured timeout and retry policy:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! `max_retries` defaults to 0, so by default nothing is retried.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::config::OllamaConfig;

/// Build an HTTP client honouring `ollama.timeout_secs`.
pub fn http_client(config: &OllamaConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}

pub fn endpoint(config: &OllamaConfig, path: &str) -> String {
    format!("{}/{}", config.url.trim_end_matches('/'), path)
}

/// POST a JSON body to `{url}/{path}` and return the parsed JSON response.
pub async fn post_json(
    client: &reqwest::Client,
    config: &OllamaConfig,
    path: &str,
    body: &serde_json::Value,
) -> Result<serde_json::Value> {
    let url = endpoint(config, path);
    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::warn!(%url, attempt, ?delay, "retrying Ollama request");
            tokio::time::sleep(delay).await;
        }

        let resp = client.post(&url).json(body).send().await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "Ollama API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("Ollama API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    config.url,
                    e
                ));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Ollama request failed after retries")))
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

/// Names of the models installed in the Ollama runtime (`GET /api/tags`).
pub async fn installed_models(config: &OllamaConfig) -> Result<Vec<String>> {
    let client = http_client(config)?;
    let url = endpoint(config, "api/tags");
    let response = client.get(&url).send().await.map_err(|e| {
        anyhow::anyhow!(
            "Ollama connection error (is Ollama running at {}?): {}",
            config.url,
            e
        )
    })?;
    if !response.status().is_success() {
        bail!("Ollama API error {} from {}", response.status(), url);
    }
    let tags: TagsResponse = response.json().await?;
    Ok(tags.models.into_iter().map(|m| m.name).collect())
}

/// Whether `model` is among `installed`. A bare name matches its `:latest` tag.
pub fn model_installed(installed: &[String], model: &str) -> bool {
    installed.iter().any(|name| {
        name == model
            || (!model.contains(':') && name.strip_suffix(":latest") == Some(model))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let mut config = OllamaConfig::default();
        assert_eq!(
            endpoint(&config, "api/embed"),
            "http://localhost:11434/api/embed"
        );
        config.url = "http://gpu-box:11434/".to_string();
        assert_eq!(
            endpoint(&config, "api/generate"),
            "http://gpu-box:11434/api/generate"
        );
    }

    #[test]
    fn bare_model_name_matches_latest_tag() {
        let installed = vec!["llama3:latest".to_string(), "nomic-embed-text:v1.5".to_string()];
        assert!(model_installed(&installed, "llama3"));
        assert!(model_installed(&installed, "llama3:latest"));
        assert!(!model_installed(&installed, "nomic-embed-text"));
        assert!(model_installed(&installed, "nomic-embed-text:v1.5"));
        assert!(!model_installed(&installed, "mistral"));
    }
}

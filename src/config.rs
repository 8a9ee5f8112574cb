//! TOML configuration.
//!
//! Every section and key has a default, so `docchat serve` works without a
//! config file. See `config/docchat.example.toml` for a complete example.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub ollama: OllamaConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Chunk sizes are measured in characters, not tokens.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks fed to the model on the grounded chat path.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OllamaConfig {
    pub url: String,
    pub chat_model: String,
    pub embed_model: String,
    /// Texts per `/api/embed` call when indexing.
    pub batch_size: usize,
    pub max_retries: u32,
    /// Request timeout. Unset means calls wait for Ollama indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            chat_model: "llama3".to_string(),
            embed_model: "llama3".to_string(),
            batch_size: 32,
            max_retries: 0,
            timeout_secs: None,
        }
    }
}

impl ServerConfig {
    /// Upload limit rendered for user-facing messages, e.g. `5MB`.
    pub fn max_upload_label(&self) -> String {
        const MIB: usize = 1024 * 1024;
        if self.max_upload_bytes % MIB == 0 {
            format!("{}MB", self.max_upload_bytes / MIB)
        } else {
            format!("{} bytes", self.max_upload_bytes)
        }
    }
}

/// Load the config from `path`, or the defaults when no path is given.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None => {
            let config = Config::default();
            validate(&config)?;
            Ok(config)
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes must be > 0");
    }

    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.ollama.url.trim().is_empty() {
        anyhow::bail!("ollama.url must not be empty");
    }
    if config.ollama.chat_model.trim().is_empty() || config.ollama.embed_model.trim().is_empty() {
        anyhow::bail!("ollama.chat_model and ollama.embed_model must be set");
    }
    if config.ollama.batch_size == 0 {
        anyhow::bail!("ollama.batch_size must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_match_upload_pipeline() {
        let config = load_or_default(None).unwrap();
        assert_eq!(config.server.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(config.chunking.chunk_size, 1500);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.ollama.chat_model, "llama3");
        assert_eq!(config.ollama.embed_model, "llama3");
        assert!(config.ollama.timeout_secs.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let file = write_config(
            r#"
[ollama]
chat_model = "mistral"

[retrieval]
top_k = 2
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.ollama.chat_model, "mistral");
        assert_eq!(config.ollama.embed_model, "llama3");
        assert_eq!(config.retrieval.top_k, 2);
        assert_eq!(config.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let file = write_config("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn zero_top_k_rejected() {
        let file = write_config("[retrieval]\ntop_k = 0\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_config(Path::new("/nonexistent/docchat.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn upload_label() {
        assert_eq!(ServerConfig::default().max_upload_label(), "5MB");
        let odd = ServerConfig {
            max_upload_bytes: 1000,
            ..ServerConfig::default()
        };
        assert_eq!(odd.max_upload_label(), "1000 bytes");
    }
}

//! # doc-chat CLI (`docchat`)
//!
//! Starts the HTTP server and offers two offline helpers for checking a
//! deployment before pointing a front end at it.
//!
//! ## Usage
//!
//! ```bash
//! docchat [--config ./config/docchat.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat serve` | Start the HTTP server |
//! | `docchat check` | Verify Ollama is reachable and the models are pulled |
//! | `docchat chunk <file>` | Extract and chunk a local file, printing chunk sizes |
//!
//! Logging is controlled with `RUST_LOG` (default `doc_chat=info,tower_http=info`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use doc_chat::chunk::chunk_text;
use doc_chat::config::{self, Config};
use doc_chat::extract::{extract_text, DocumentFormat};
use doc_chat::{ollama, server};

/// doc-chat: chat with a local model, optionally grounded in one uploaded
/// document.
#[derive(Parser)]
#[command(name = "docchat", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Optional; without it every setting takes its default.
    /// See `config/docchat.example.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve,

    /// Check that Ollama is reachable and the configured models are installed.
    Check,

    /// Extract and chunk a local file without embedding it.
    ///
    /// Prints one line per chunk with its index and character count.
    Chunk {
        /// PDF, DOCX or TXT file to chunk.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => server::run_server(&config).await?,
        Commands::Check => run_check(&config).await?,
        Commands::Chunk { path } => run_chunk(&config, &path).await?,
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doc_chat=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_check(config: &Config) -> Result<()> {
    let installed = ollama::installed_models(&config.ollama).await?;
    println!(
        "Ollama at {} has {} model(s) installed",
        config.ollama.url,
        installed.len()
    );

    let mut missing = Vec::new();
    for (role, model) in [
        ("chat", &config.ollama.chat_model),
        ("embedding", &config.ollama.embed_model),
    ] {
        if ollama::model_installed(&installed, model) {
            println!("  {:<10} {:<24} ok", role, model);
        } else {
            println!("  {:<10} {:<24} MISSING (run `ollama pull {}`)", role, model, model);
            missing.push(model.as_str());
        }
    }

    if !missing.is_empty() {
        bail!("{} model(s) not installed: {}", missing.len(), missing.join(", "));
    }
    Ok(())
}

async fn run_chunk(config: &Config, path: &Path) -> Result<()> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let format = match DocumentFormat::from_filename(&filename) {
        Some(f) => f,
        None => bail!("Unsupported file format: {}", path.display()),
    };

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let text = extract_text(&bytes, format)
        .with_context(|| format!("Failed to extract text from {}", path.display()))?;
    if text.trim().is_empty() {
        bail!("No text found in {}", path.display());
    }

    let chunks = chunk_text(&filename, &text, &config.chunking);
    println!(
        "{}: {} chars, {} chunk(s) (size {}, overlap {})",
        path.display(),
        text.chars().count(),
        chunks.len(),
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    for chunk in &chunks {
        println!("  #{:<4} {:>6} chars", chunk.chunk_index, chunk.text.chars().count());
    }

    Ok(())
}

//! Application context: the chat, upload and clear operations.
//!
//! [`AppContext`] owns the single document index slot and the single
//! conversation memory. It is built once at startup and shared with every
//! request handler through an `Arc`; nothing here is a global.
//!
//! # Chat routing
//!
//! ```text
//! use_document_context && index present
//!     ├── yes → query index with message → grounded prompt (chunks + transcript)
//!     └── no  → conversational prompt (transcript only)
//!                         │
//!                         ▼
//!                 model.generate(prompt) → append (message, answer) to memory
//! ```
//!
//! # Index replacement
//!
//! An upload builds a complete new [`DocumentIndex`] off-lock and swaps it
//! in only if every step succeeded. The lock is held just long enough to
//! clone or replace the `Arc`, so a chat that already holds the old index
//! finishes against it.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{ChatError, UploadError};
use crate::extract::{extract_text, DocumentFormat};
use crate::index::DocumentIndex;
use crate::llm::{ChatModel, Prompt};
use crate::memory::ConversationMemory;
use crate::models::Upload;

pub struct AppContext {
    config: Config,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn ChatModel>,
    index: RwLock<Option<Arc<DocumentIndex>>>,
    memory: ConversationMemory,
}

impl AppContext {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, model: Arc<dyn ChatModel>) -> Self {
        Self {
            config,
            embedder,
            model,
            index: RwLock::new(None),
            memory: ConversationMemory::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// The active index, if an upload has succeeded since startup.
    pub fn current_index(&self) -> Option<Arc<DocumentIndex>> {
        self.index.read().clone()
    }

    pub fn has_index(&self) -> bool {
        self.index.read().is_some()
    }

    /// Answer `message`, grounding it in the uploaded document when asked
    /// and when one is indexed. Memory is only updated on success.
    pub async fn chat(&self, message: &str, use_document_context: bool) -> Result<String, ChatError> {
        let history = self.memory.snapshot();
        let index = if use_document_context {
            self.current_index()
        } else {
            None
        };

        let prompt = match index {
            Some(index) => {
                let documents = index
                    .query(self.embedder.as_ref(), message, self.config.retrieval.top_k)
                    .await
                    .map_err(ChatError::Retrieval)?;
                tracing::debug!(
                    retrieved = documents.len(),
                    source = index.source().unwrap_or_default(),
                    "grounded chat"
                );
                Prompt::grounded(history, documents, message)
            }
            None => {
                if use_document_context {
                    tracing::debug!("document context requested but nothing is indexed");
                }
                Prompt::conversational(history, message)
            }
        };

        tracing::debug!(
            model = self.model.model_name(),
            grounded = prompt.is_grounded(),
            history = prompt.history.len(),
            "generating answer"
        );
        let answer = self
            .model
            .generate(&prompt)
            .await
            .map_err(ChatError::Model)?;
        self.memory.append_exchange(message, &answer);
        Ok(answer)
    }

    /// Validate, extract, chunk and index `upload`, replacing the current
    /// index. Returns the success message naming the file.
    pub async fn upload(&self, upload: Upload) -> Result<String, UploadError> {
        let server = &self.config.server;
        if upload.bytes.len() > server.max_upload_bytes {
            return Err(UploadError::TooLarge {
                size: upload.bytes.len(),
                limit: server.max_upload_bytes,
                limit_label: server.max_upload_label(),
            });
        }

        if DocumentFormat::from_content_type(&upload.content_type).is_none() {
            return Err(UploadError::InvalidType(upload.content_type));
        }

        // The extension picks the extractor; the declared type was only a gate.
        let source = upload.filename.to_lowercase();
        let format = DocumentFormat::from_filename(&source)
            .ok_or_else(|| UploadError::UnsupportedFormat(upload.filename.clone()))?;

        let bytes = upload.bytes;
        let text = tokio::task::spawn_blocking(move || extract_text(&bytes, format))
            .await
            .map_err(|e| UploadError::Processing(format!("extraction task failed: {}", e)))??;

        if text.trim().is_empty() {
            return Err(UploadError::NoText(upload.filename));
        }

        let chunks = chunk_text(&source, &text, &self.config.chunking);
        tracing::info!(
            file = %upload.filename,
            chars = text.chars().count(),
            chunks = chunks.len(),
            "indexing upload"
        );

        let index = DocumentIndex::build(
            self.embedder.as_ref(),
            chunks,
            self.config.ollama.batch_size,
        )
        .await
        .map_err(|e| UploadError::EmbeddingUnavailable {
            model: self.embedder.model_name().to_string(),
            source: e,
        })?;

        *self.index.write() = Some(Arc::new(index));

        Ok(format!(
            "File '{}' uploaded and processed successfully!",
            upload.filename
        ))
    }

    pub fn clear(&self) {
        self.memory.clear();
    }
}

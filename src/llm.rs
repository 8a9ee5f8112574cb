//! Language model abstraction and prompt assembly.
//!
//! A [`Prompt`] is built fresh for every chat call from the conversation
//! transcript and, on the grounded path, the chunks retrieved from the
//! document index. [`ChatModel`] turns a prompt into an answer;
//! [`OllamaChat`] does so through Ollama's `/api/generate`.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::OllamaConfig;
use crate::memory::render_transcript;
use crate::models::{ScoredChunk, Turn};
use crate::ollama;

/// Everything the model sees for one chat turn.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Transcript before this turn, oldest first.
    pub history: Vec<Turn>,
    /// Retrieved context. Empty on the plain conversational path.
    pub documents: Vec<ScoredChunk>,
    pub question: String,
}

impl Prompt {
    pub fn conversational(history: Vec<Turn>, question: impl Into<String>) -> Self {
        Self {
            history,
            documents: Vec::new(),
            question: question.into(),
        }
    }

    pub fn grounded(
        history: Vec<Turn>,
        documents: Vec<ScoredChunk>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            history,
            documents,
            question: question.into(),
        }
    }

    pub fn is_grounded(&self) -> bool {
        !self.documents.is_empty()
    }

    /// Render to the single prompt string sent to a completion endpoint.
    pub fn render(&self) -> String {
        if self.is_grounded() {
            self.render_grounded()
        } else {
            self.render_conversational()
        }
    }

    fn render_conversational(&self) -> String {
        format!(
            "You are a helpful assistant having a conversation with a human. \
             Answer with specific details where you can. If you do not know \
             the answer, say so plainly.\n\n\
             Conversation so far:\n{}\nHuman: {}\nAI:",
            render_transcript(&self.history),
            self.question
        )
    }

    fn render_grounded(&self) -> String {
        let context = self
            .documents
            .iter()
            .map(|d| d.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        format!(
            "Use the following excerpts from the uploaded document to answer \
             the question at the end. If the excerpts do not contain the \
             answer, say that you don't know instead of making one up.\n\n\
             {}\n\n\
             Conversation so far:\n{}\n\
             Question: {}\nHelpful Answer:",
            context,
            render_transcript(&self.history),
            self.question
        )
    }
}

/// Trait for language model backends.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the model identifier (e.g. `"llama3"`).
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}

// ============ Ollama ============

/// Chat model backed by Ollama's non-streaming `POST /api/generate`.
pub struct OllamaChat {
    client: reqwest::Client,
    config: OllamaConfig,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaChat {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        Ok(Self {
            client: ollama::http_client(config)?,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.config.chat_model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.chat_model,
            "prompt": prompt.render(),
            "stream": false,
        });
        let json = ollama::post_json(&self.client, &self.config, "api/generate", &body).await?;
        let parsed: GenerateResponse = serde_json::from_value(json)
            .map_err(|e| anyhow::anyhow!("Invalid Ollama response: {}", e))?;
        Ok(parsed.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn scored(text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: "c1".to_string(),
                source: "a.txt".to_string(),
                chunk_index: 0,
                text: text.to_string(),
            },
            score: 0.9,
        }
    }

    #[test]
    fn conversational_prompt_carries_history() {
        let history = vec![Turn::human("Hi, I'm Sam."), Turn::ai("Hello Sam!")];
        let prompt = Prompt::conversational(history, "What's my name?");
        assert!(!prompt.is_grounded());
        let rendered = prompt.render();
        assert!(rendered.contains("Human: Hi, I'm Sam.\nAI: Hello Sam!"));
        assert!(rendered.ends_with("Human: What's my name?\nAI:"));
    }

    #[test]
    fn grounded_prompt_includes_chunks_and_history() {
        let prompt = Prompt::grounded(
            vec![Turn::human("hello"), Turn::ai("hi")],
            vec![scored("Paris is the capital of France.")],
            "What is the capital of France?",
        );
        assert!(prompt.is_grounded());
        let rendered = prompt.render();
        assert!(rendered.contains("Paris is the capital of France."));
        assert!(rendered.contains("Human: hello\nAI: hi"));
        assert!(rendered.ends_with("Question: What is the capital of France?\nHelpful Answer:"));
    }

    #[test]
    fn empty_history_renders_empty_transcript() {
        let rendered = Prompt::conversational(Vec::new(), "ping").render();
        assert!(rendered.contains("Conversation so far:\n\nHuman: ping"));
    }
}

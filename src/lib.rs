//! # doc-chat
//!
//! A chat backend that can ground its answers in one uploaded document.
//!
//! A user uploads a PDF, DOCX or plain-text file; its text is extracted,
//! split into overlapping chunks, embedded through Ollama and held in an
//! in-memory index. Chat requests either talk to the model with the running
//! conversation only, or first retrieve the most relevant chunks and answer
//! from them.
//!
//! ## Architecture
//!
//! ```text
//! upload ─▶ extract ─▶ chunk ─▶ embed ─▶ DocumentIndex (replaced whole)
//!                                              │
//! chat ──▶ ConversationMemory ─┬───────────────┤ (if requested and present)
//!                              ▼               ▼
//!                         Prompt ─────▶ ChatModel (Ollama) ─▶ answer
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ollama pull llama3
//! docchat check                 # verify the configured models are installed
//! docchat serve                 # listen on 127.0.0.1:8000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF, DOCX and text extraction |
//! | [`chunk`] | Recursive character chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Prompt assembly and chat model abstraction |
//! | [`ollama`] | Shared Ollama HTTP plumbing |
//! | [`index`] | In-memory vector index |
//! | [`memory`] | Conversation transcript |
//! | [`error`] | Upload and chat error kinds |
//! | [`app`] | Chat, upload and clear operations |
//! | [`server`] | HTTP API |

pub mod app;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod llm;
pub mod memory;
pub mod models;
pub mod ollama;
pub mod server;

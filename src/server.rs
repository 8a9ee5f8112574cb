//! HTTP server.
//!
//! Exposes the chat, upload and clear operations of [`AppContext`] as a
//! small JSON API for a browser front end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/health` | Health check |
//! | `POST` | `/api/chat` | Chat, optionally grounded in the uploaded document |
//! | `POST` | `/api/upload` | Upload a PDF, DOCX or TXT file (multipart field `file`) |
//! | `POST` | `/api/clear` | Clear the conversation history |
//!
//! # Response Contract
//!
//! Every operation answers `200 OK` with a single-field JSON object:
//!
//! ```json
//! { "response": "File 'notes.txt' uploaded and processed successfully!" }
//! ```
//!
//! Failures are reported as fixed human-readable messages in the same
//! `response` field. The underlying cause is logged, never returned.
//!
//! # CORS
//!
//! Any origin, method and header is accepted, with credentials. Origin,
//! methods and headers are mirrored from the request since the `*`
//! wildcard cannot be combined with credentials.

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::AppContext;
use crate::config::Config;
use crate::embedding::OllamaEmbedder;
use crate::error::{UploadError, CHAT_FAILURE_MESSAGE};
use crate::llm::OllamaChat;
use crate::models::Upload;

/// Multipart field carrying the uploaded file.
const UPLOAD_FIELD: &str = "file";

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_FRAMING_ALLOWANCE: usize = 64 * 1024;

/// Starts the HTTP server backed by the configured Ollama instance.
///
/// Binds to `[server].bind` and runs until the process is terminated.
/// Returns an error if the Ollama clients cannot be built or binding fails.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let embedder = OllamaEmbedder::new(&config.ollama)?;
    let model = OllamaChat::new(&config.ollama)?;
    let ctx = Arc::new(AppContext::new(
        config.clone(),
        Arc::new(embedder),
        Arc::new(model),
    ));

    let app = router(ctx);
    let bind_addr = &config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(
        addr = %bind_addr,
        chat_model = %config.ollama.chat_model,
        embed_model = %config.ollama.embed_model,
        "doc-chat listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the API router over an existing context.
///
/// Split out from [`run_server`] so tests can drive the routes with
/// in-process embedders and models.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let body_limit = upload_body_limit(ctx.config().server.max_upload_bytes);

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/chat", post(handle_chat))
        .route(
            "/api/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/clear", post(handle_clear))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ctx)
}

/// Hard cap on an upload request body. Any file within `max_upload_bytes`
/// fits together with its multipart framing, so only the handler's own
/// size check ever rejects it.
fn upload_body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes
        .saturating_mul(2)
        .max(max_upload_bytes.saturating_add(MULTIPART_FRAMING_ALLOWANCE))
}

/// Body of every non-health response.
#[derive(Serialize)]
struct MessageResponse {
    response: String,
}

impl MessageResponse {
    fn new(response: impl Into<String>) -> Json<Self> {
        Json(Self {
            response: response.into(),
        })
    }
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    use_document_context: bool,
}

/// Handler for `POST /api/chat`.
///
/// Model and retrieval failures, unparseable bodies and a missing
/// `message` are logged and answered with one generic message; the
/// conversation history is left as it was.
async fn handle_chat(
    State(ctx): State<Arc<AppContext>>,
    req: Result<Json<ChatRequest>, JsonRejection>,
) -> Json<MessageResponse> {
    let req = match req {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "unreadable chat request");
            return MessageResponse::new(CHAT_FAILURE_MESSAGE);
        }
    };
    let Some(message) = req.message else {
        tracing::warn!("chat request without a message");
        return MessageResponse::new(CHAT_FAILURE_MESSAGE);
    };

    match ctx.chat(&message, req.use_document_context).await {
        Ok(answer) => MessageResponse::new(answer),
        Err(err) => {
            tracing::error!(error = ?err, "chat failed");
            MessageResponse::new(err.user_message())
        }
    }
}

// ============ POST /api/upload ============

/// Handler for `POST /api/upload`.
///
/// Reads the `file` field and hands it to [`AppContext::upload`]. A
/// malformed body or a missing field gets the generic failure message.
async fn handle_upload(
    State(ctx): State<Arc<AppContext>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Json<MessageResponse> {
    let upload = match read_upload(&ctx, multipart).await {
        Ok(upload) => upload,
        Err(err) => return upload_failure(err),
    };

    let filename = upload.filename.clone();
    match ctx.upload(upload).await {
        Ok(message) => {
            tracing::info!(file = %filename, "upload indexed");
            MessageResponse::new(message)
        }
        Err(err) => upload_failure(err),
    }
}

async fn read_upload(
    ctx: &AppContext,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Upload, UploadError> {
    let mut multipart =
        multipart.map_err(|e| UploadError::Processing(format!("bad multipart request: {}", e)))?;

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(ctx, e))?
            .ok_or_else(|| {
                UploadError::Processing(format!("missing multipart field '{}'", UPLOAD_FIELD))
            })?;

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| multipart_error(ctx, e))?;

        return Ok(Upload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
}

/// Bodies past the route's hard limit are still reported as too large.
fn multipart_error(
    ctx: &AppContext,
    err: axum::extract::multipart::MultipartError,
) -> UploadError {
    let server = &ctx.config().server;
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge {
            size: upload_body_limit(server.max_upload_bytes),
            limit: server.max_upload_bytes,
            limit_label: server.max_upload_label(),
        }
    } else {
        UploadError::Processing(format!("unreadable multipart body: {}", err))
    }
}

fn upload_failure(err: UploadError) -> Json<MessageResponse> {
    match &err {
        UploadError::Decode(_)
        | UploadError::Processing(_)
        | UploadError::EmbeddingUnavailable { .. } => {
            tracing::error!(error = %err, "upload failed")
        }
        _ => tracing::warn!(error = %err, "upload rejected"),
    }
    MessageResponse::new(err.user_message())
}

// ============ POST /api/clear ============

async fn handle_clear(State(ctx): State<Arc<AppContext>>) -> Json<MessageResponse> {
    ctx.clear();
    tracing::info!("conversation history cleared");
    MessageResponse::new("Conversation history cleared.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_limit_always_leaves_room_for_framing() {
        assert_eq!(upload_body_limit(64), 64 + MULTIPART_FRAMING_ALLOWANCE);
        assert_eq!(upload_body_limit(5 * 1024 * 1024), 10 * 1024 * 1024);
        for limit in [1, 64, 1000, 64 * 1024, 5 * 1024 * 1024] {
            assert!(upload_body_limit(limit) >= limit + 1024);
        }
        assert_eq!(upload_body_limit(usize::MAX), usize::MAX);
    }
}

//! Error kinds for the upload and chat operations.
//!
//! Every kind maps to one fixed user-facing message via `user_message()`.
//! The `Display` output carries the underlying cause and is meant for logs
//! only; it never reaches an HTTP client.

use thiserror::Error;

use crate::extract::ExtractError;

/// Reply sent for any chat failure, whatever the cause.
pub const CHAT_FAILURE_MESSAGE: &str = "Something went wrong while processing your message.";

/// Reply sent for upload failures that have no more specific message.
pub const UPLOAD_FAILURE_MESSAGE: &str = "Failed to process the uploaded file.";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge {
        size: usize,
        limit: usize,
        limit_label: String,
    },

    #[error("content type not accepted: {0}")]
    InvalidType(String),

    #[error("unsupported file extension: {0}")]
    UnsupportedFormat(String),

    #[error("could not decode upload: {0}")]
    Decode(#[source] ExtractError),

    #[error("no text extracted from {0}")]
    NoText(String),

    #[error("embedding model '{model}' unavailable: {source}")]
    EmbeddingUnavailable {
        model: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("upload processing failed: {0}")]
    Processing(String),
}

impl UploadError {
    pub fn user_message(&self) -> String {
        match self {
            UploadError::TooLarge { limit_label, .. } => {
                format!("File too large. Please upload a file under {}.", limit_label)
            }
            UploadError::InvalidType(_) => {
                "Invalid file type. Please upload a PDF, DOCX, or TXT file.".to_string()
            }
            UploadError::UnsupportedFormat(_) => "Unsupported file format.".to_string(),
            UploadError::NoText(_) => "No text found in file.".to_string(),
            UploadError::EmbeddingUnavailable { model, .. } => format!(
                "Embedding model not available. Please pull it with `ollama pull {}`.",
                model
            ),
            UploadError::Decode(_) | UploadError::Processing(_) => {
                UPLOAD_FAILURE_MESSAGE.to_string()
            }
        }
    }
}

impl From<ExtractError> for UploadError {
    fn from(err: ExtractError) -> Self {
        UploadError::Decode(err)
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("document retrieval failed: {0}")]
    Retrieval(#[source] anyhow::Error),

    #[error("model call failed: {0}")]
    Model(#[source] anyhow::Error),
}

impl ChatError {
    pub fn user_message(&self) -> &'static str {
        CHAT_FAILURE_MESSAGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_messages_are_fixed_per_kind() {
        let too_large = UploadError::TooLarge {
            size: 10,
            limit: 5,
            limit_label: "5MB".to_string(),
        };
        assert_eq!(
            too_large.user_message(),
            "File too large. Please upload a file under 5MB."
        );
        assert_eq!(
            UploadError::InvalidType("image/png".into()).user_message(),
            "Invalid file type. Please upload a PDF, DOCX, or TXT file."
        );
        assert_eq!(
            UploadError::NoText("a.txt".into()).user_message(),
            "No text found in file."
        );
        assert_eq!(
            UploadError::Processing("boom".into()).user_message(),
            UPLOAD_FAILURE_MESSAGE
        );
    }

    #[test]
    fn embedding_message_names_model() {
        let err = UploadError::EmbeddingUnavailable {
            model: "llama3".into(),
            source: anyhow::anyhow!("connection refused"),
        };
        assert_eq!(
            err.user_message(),
            "Embedding model not available. Please pull it with `ollama pull llama3`."
        );
        // the cause stays in the log-facing Display only
        assert!(err.to_string().contains("connection refused"));
        assert!(!err.user_message().contains("connection refused"));
    }

    #[test]
    fn chat_errors_share_one_message() {
        let a = ChatError::Model(anyhow::anyhow!("500 from ollama"));
        let b = ChatError::Retrieval(anyhow::anyhow!("embed failed"));
        assert_eq!(a.user_message(), b.user_message());
        assert_eq!(a.user_message(), CHAT_FAILURE_MESSAGE);
    }
}

//! Application errors and their HTTP rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::llm::{ErrorKind, ProviderError};
use crate::loader::LoadError;
use crate::search::vector::VectorError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No file provided")]
    NoFile,

    #[error("Only PDF files are supported")]
    NotPdf,

    #[error("Invalid upload: {0}")]
    BadUpload(String),

    /// Saving the uploaded bytes failed before processing started
    #[error("Error uploading document: {0}")]
    Storage(#[source] std::io::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error("No text could be extracted from the PDF")]
    NoText,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Error::NoFile | Error::NotPdf | Error::BadUpload(_) => {
                (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() }))
            }
            Error::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": self.to_string() }),
            ),
            Error::Provider(e) => match e.kind() {
                ErrorKind::RateLimit => (
                    StatusCode::TOO_MANY_REQUESTS,
                    json!({
                        "error": e.to_string(),
                        "error_type": "rate_limit",
                        "suggestion": format!(
                            "Please check your {} account billing and plan. You may need to add credits or wait for the rate limit to reset.",
                            e.provider()
                        ),
                    }),
                ),
                ErrorKind::Authentication => (
                    StatusCode::UNAUTHORIZED,
                    json!({
                        "error": e.to_string(),
                        "error_type": "authentication",
                        "suggestion": format!(
                            "Please verify your {} in the .env file is correct and valid.",
                            e.provider().key_env().unwrap_or("API key")
                        ),
                    }),
                ),
                ErrorKind::Other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": e.to_string(), "error_type": "api_error" }),
                ),
            },
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": format!("Error processing document: {self}"),
                    "error_type": "unknown",
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

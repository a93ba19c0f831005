//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::PipelineError;

/// Error body: `{"success": false, "error": "...", "code": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No image file provided")]
    NoFileProvided,
    #[error("Unknown document type: {0}")]
    UnknownDocumentType(String),
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NoFileProvided => (
                StatusCode::BAD_REQUEST,
                "NO_FILE",
                "No image file provided".to_string(),
            ),
            ApiError::UnknownDocumentType(tag) => (
                StatusCode::BAD_REQUEST,
                "UNKNOWN_DOCUMENT_TYPE",
                format!("Unknown document type: {tag}"),
            ),
            ApiError::ExtractionFailed(detail) => {
                tracing::warn!(detail, "Extraction failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "EXTRACTION_FAILED",
                    format!("Document analysis failed: {detail}"),
                )
            }
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            success: false,
            error: message,
            code,
        };
        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NoFileProvided => ApiError::NoFileProvided,
            PipelineError::UnknownDocumentType(tag) => ApiError::UnknownDocumentType(tag),
            PipelineError::ExtractionFailed(e) => ApiError::ExtractionFailed(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

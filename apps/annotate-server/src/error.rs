//! Error types for the annotation server

use annotate_core::{PipelineError, RenderError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ApiError::Pipeline(err) => match err {
                PipelineError::InvalidKey { .. } => (StatusCode::BAD_REQUEST, "INVALID_FILENAME"),
                PipelineError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
                PipelineError::MissingField(_) => (StatusCode::BAD_REQUEST, "MISSING_FIELD"),
                PipelineError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                PipelineError::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, "TIMEOUT"),
                PipelineError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
                PipelineError::Render(RenderError::PageOverflow { .. }) => {
                    (StatusCode::BAD_REQUEST, "PAGE_OVERFLOW")
                }
                PipelineError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RENDER_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status.is_server_error() {
            tracing::error!(code, "Request failed: {}", self);
            match &self {
                // Filesystem details stay in the logs
                ApiError::Pipeline(PipelineError::Io(_)) => "Storage error".to_string(),
                _ => self.to_string(),
            }
        } else {
            tracing::warn!(code, "Request rejected: {}", self);
            self.to_string()
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(PipelineError::MissingFile), StatusCode::BAD_REQUEST),
            (ApiError::from(PipelineError::MissingField("text")), StatusCode::BAD_REQUEST),
            (ApiError::from(PipelineError::NotFound("a.pdf".into())), StatusCode::NOT_FOUND),
            (
                ApiError::from(PipelineError::Render(RenderError::UnsupportedImage)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::from(PipelineError::Render(RenderError::PageOverflow { lines: 50 })),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::InvalidRequest("bad".into()), StatusCode::BAD_REQUEST),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}

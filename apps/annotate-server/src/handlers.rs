//! HTTP handlers for the annotation server

use std::sync::Arc;

use annotate_core::{AnnotationRequest, PipelineError, UploadPayload};
use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::pages::route;
use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "annotate-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Handler: GET /
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let documents = state.pipeline.documents().await?;
    Ok(Html(state.templates.index_page(&documents)))
}

/// Handler: POST /upload
///
/// Stores the multipart `file` part and redirects to its edit view.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut payload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Failed to read upload: {}", e)))?
    {
        if field.name() != Some("file") {
            debug!(field = ?field.name(), "Skipping multipart field");
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to read file data: {}", e)))?;

        // Browsers send an empty, unnamed part when no file was chosen
        if filename.is_empty() && bytes.is_empty() {
            break;
        }

        payload = Some(UploadPayload {
            filename,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let key = state.pipeline.upload(payload).await?;

    Ok(redirect(StatusCode::FOUND, &route("edit", key.as_str())))
}

/// Handler: GET /edit/:filename
pub async fn edit(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Html<String>, ApiError> {
    let preview = state.pipeline.preview(&filename).await?;
    Ok(Html(state.templates.edit_page(&preview)))
}

/// URL-encoded body for POST /save/:filename
#[derive(Debug, Deserialize)]
pub struct SaveForm {
    pub text: Option<String>,
}

/// Handler: POST /save/:filename
///
/// Accepts `application/x-www-form-urlencoded` (`text`) or
/// `multipart/form-data` (`text` plus an optional PNG `signature`).
/// Redirects to the download link once the artifact is stored.
pub async fn save(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (text, signature) = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
        read_annotation_parts(multipart).await?
    } else {
        let Form(form) = Form::<SaveForm>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
        (form.text, None)
    };

    let text = text.ok_or(PipelineError::MissingField("text"))?;

    let key = state
        .pipeline
        .save(AnnotationRequest {
            filename,
            text,
            signature,
        })
        .await?;

    Ok(redirect(StatusCode::SEE_OTHER, &route("download", key.as_str())))
}

async fn read_annotation_parts(
    mut multipart: Multipart,
) -> Result<(Option<String>, Option<Vec<u8>>), ApiError> {
    let mut text = None;
    let mut signature = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Failed to read form: {}", e)))?
    {
        match field.name() {
            Some("text") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidRequest(format!("Invalid text field: {}", e)))?;
                text = Some(value);
            }
            Some("signature") => {
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::InvalidRequest(format!("Failed to read signature: {}", e))
                })?;
                signature = Some(bytes.to_vec());
            }
            other => debug!(field = ?other, "Skipping multipart field"),
        }
    }

    Ok((text, signature))
}

/// Handler: GET /download/:filename
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let artifact = state.pipeline.download(&filename).await?;

    info!(document = %artifact.filename, bytes = artifact.bytes.len(), "Download");

    let disposition = content_disposition(artifact.filename.as_str());
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response())
}

fn redirect(status: StatusCode, location: &str) -> Response {
    // Percent-encoded routes are always valid header values
    match HeaderValue::from_str(location) {
        Ok(value) => (status, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// `attachment` disposition carrying the original filename, with an ASCII
/// fallback plus the RFC 5987 UTF-8 form
fn content_disposition(filename: &str) -> HeaderValue {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();
    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        let value = content_disposition("doc.pdf");
        assert_eq!(
            value.to_str().unwrap(),
            "attachment; filename=\"doc.pdf\"; filename*=UTF-8''doc.pdf"
        );
    }

    #[test]
    fn test_content_disposition_non_ascii_and_quotes() {
        let value = content_disposition("résumé \"v2\".pdf");
        let text = value.to_str().unwrap();
        assert!(text.contains("filename=\"r_sum_ _v2_.pdf\""));
        assert!(text.contains("filename*=UTF-8''r%C3%A9sum%C3%A9%20%22v2%22.pdf"));
    }
}

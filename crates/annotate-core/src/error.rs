//! Error types for the annotation pipeline

use std::time::Duration;

use thiserror::Error;

use crate::store::Partition;

/// Blob store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid document key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("Document '{key}' not found in {partition}")]
    NotFound { partition: Partition, key: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Annotation page generation failures
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Character {0:?} cannot be encoded with the page font")]
    UnencodableText(char),

    #[error("Annotation with {lines} lines does not fit on one page")]
    PageOverflow { lines: usize },

    #[error("Unsupported signature image format (expected PNG)")]
    UnsupportedImage,

    #[error("Failed to decode signature image: {0}")]
    Image(String),

    #[error("Failed to encode PDF: {0}")]
    Pdf(String),

    #[error("Render task failed: {0}")]
    Task(String),
}

/// Pipeline stage failures, one per user-visible outcome
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid filename '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("No file provided")]
    MissingFile,

    #[error("Missing form field '{0}'")]
    MissingField(&'static str),

    #[error("Document '{0}' not found")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(std::io::Error),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidKey { key, reason } => PipelineError::InvalidKey { key, reason },
            StoreError::NotFound { key, .. } => PipelineError::NotFound(key),
            StoreError::Io(e) => PipelineError::Io(e),
            StoreError::Timeout(limit) => PipelineError::Timeout(limit),
        }
    }
}

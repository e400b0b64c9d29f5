//! Upload -> preview -> save -> download pipeline
//!
//! Each stage is one independent request. Stages are addressed by the
//! client-supplied filename, so two uploads under the same name overwrite
//! each other and two saves race with last-write-wins.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, RenderError};
use crate::render::AnnotationRenderer;
use crate::store::{BlobStore, DocumentKey, Partition};

/// Uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Edit submitted for a stored document
#[derive(Debug, Clone)]
pub struct AnnotationRequest {
    pub filename: String,
    /// May be empty
    pub text: String,
    /// PNG signature drawn below the text. Empty uploads count as absent.
    pub signature: Option<Vec<u8>>,
}

/// Original document prepared for the edit view
#[derive(Debug, Clone)]
pub struct Preview {
    pub filename: DocumentKey,
    pub pdf_base64: String,
    pub size_bytes: usize,
    pub sha256: String,
}

/// Rendered document ready to stream to the client
#[derive(Debug, Clone)]
pub struct Artifact {
    pub filename: DocumentKey,
    pub bytes: Vec<u8>,
}

/// Stored original plus whether an annotated version exists
#[derive(Debug, Clone)]
pub struct DocumentSummary {
    pub filename: DocumentKey,
    pub has_output: bool,
}

/// Coordinates the blob store and the renderer
#[derive(Debug, Clone)]
pub struct Pipeline {
    store: BlobStore,
    renderer: AnnotationRenderer,
    render_timeout: Option<Duration>,
}

impl Pipeline {
    pub fn new(store: BlobStore) -> Self {
        Self {
            store,
            renderer: AnnotationRenderer::default(),
            render_timeout: None,
        }
    }

    /// Abort rendering that takes longer than `limit`
    pub fn with_render_timeout(mut self, limit: Duration) -> Self {
        self.render_timeout = Some(limit);
        self
    }

    /// Store an uploaded original under its filename
    pub async fn upload(&self, payload: Option<UploadPayload>) -> Result<DocumentKey, PipelineError> {
        let payload = payload.ok_or(PipelineError::MissingFile)?;
        let key = DocumentKey::parse(&payload.filename)?;

        self.store
            .put(Partition::Original, key.as_str(), &payload.bytes)
            .await?;

        info!(
            document = %key,
            bytes = payload.bytes.len(),
            sha256 = %hex::encode(Sha256::digest(&payload.bytes)),
            "Stored original document"
        );
        if !payload.bytes.starts_with(b"%PDF-") {
            warn!(document = %key, "Uploaded file does not start with a PDF header");
        }

        Ok(key)
    }

    /// Load an original and encode it for embedding in the edit view
    pub async fn preview(&self, filename: &str) -> Result<Preview, PipelineError> {
        let key = DocumentKey::parse(filename)?;
        let bytes = self.store.get(Partition::Original, key.as_str()).await?;

        debug!(document = %key, bytes = bytes.len(), "Prepared preview");

        Ok(Preview {
            filename: key,
            pdf_base64: BASE64.encode(&bytes),
            size_bytes: bytes.len(),
            sha256: hex::encode(Sha256::digest(&bytes)),
        })
    }

    /// Render the annotation and store it as the derived document.
    ///
    /// The artifact is generated from the request alone; the original
    /// upload's content is not carried over. Nothing is written unless
    /// rendering succeeds.
    pub async fn save(&self, request: AnnotationRequest) -> Result<DocumentKey, PipelineError> {
        let key = DocumentKey::parse(&request.filename)?;
        let signature = request.signature.filter(|bytes| !bytes.is_empty());
        let has_signature = signature.is_some();

        let renderer = self.renderer.clone();
        let text = request.text;
        let task = tokio::task::spawn_blocking(move || renderer.render(&text, signature.as_deref()));

        let joined = match self.render_timeout {
            Some(limit) => tokio::time::timeout(limit, task)
                .await
                .map_err(|_| PipelineError::Timeout(limit))?,
            None => task.await,
        };
        let rendered = joined.map_err(|e| RenderError::Task(e.to_string()))??;

        self.store
            .put(Partition::Derived, key.as_str(), &rendered)
            .await?;

        info!(
            document = %key,
            bytes = rendered.len(),
            signature = has_signature,
            "Stored annotated document"
        );

        Ok(key)
    }

    /// Fetch the annotated document for download
    pub async fn download(&self, filename: &str) -> Result<Artifact, PipelineError> {
        let key = DocumentKey::parse(filename)?;
        let bytes = self.store.get(Partition::Derived, key.as_str()).await?;

        debug!(document = %key, bytes = bytes.len(), "Serving annotated document");

        Ok(Artifact { filename: key, bytes })
    }

    /// Uploaded documents, sorted by filename
    pub async fn documents(&self) -> Result<Vec<DocumentSummary>, PipelineError> {
        let originals = self.store.list(Partition::Original).await?;

        let mut summaries = Vec::with_capacity(originals.len());
        for filename in originals {
            let has_output = self.store.exists(Partition::Derived, filename.as_str()).await?;
            summaries.push(DocumentSummary { filename, has_output });
        }
        Ok(summaries)
    }
}

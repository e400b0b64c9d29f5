//! Document annotation pipeline
//!
//! Takes uploaded PDF bytes, stores them, and produces a downloadable
//! single-page artifact carrying a text annotation (and optionally a
//! signature image).
//!
//! - [`store`]: filesystem blob store with `uploads` and `output` partitions
//! - [`render`]: builds the annotation page with lopdf
//! - [`pipeline`]: upload, preview, save and download stages
//!
//! The generated artifact does not carry over any content from the uploaded
//! document. Only the annotation itself is rendered.

pub mod encoding;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod signature;
pub mod store;

pub use error::{PipelineError, RenderError, StoreError};
pub use pipeline::{AnnotationRequest, Artifact, DocumentSummary, Pipeline, Preview, UploadPayload};
pub use render::{page_count, AnnotationRenderer, PageLayout};
pub use store::{BlobStore, DocumentKey, Partition};

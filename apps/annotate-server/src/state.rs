//! Application state for the annotation server

use std::path::PathBuf;
use std::time::Duration;

use annotate_core::{BlobStore, Pipeline};
use anyhow::Result;

use crate::pages::Templates;
use crate::Args;

/// Everything handlers need, built once at startup
pub struct AppState {
    pub pipeline: Pipeline,
    pub templates: Templates,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut store = BlobStore::new(&args.data_dir);
        if args.io_timeout_ms > 0 {
            store = store.with_io_timeout(Duration::from_millis(args.io_timeout_ms));
        }

        let mut pipeline = Pipeline::new(store);
        if args.render_timeout_ms > 0 {
            pipeline = pipeline.with_render_timeout(Duration::from_millis(args.render_timeout_ms));
        }

        let templates = Templates::load(&args.templates_dir)?;

        tracing::info!(
            data_dir = %args.data_dir.display(),
            templates_dir = %args.templates_dir.display(),
            static_dir = %args.static_dir.display(),
            "Initialized application state"
        );

        Ok(Self {
            pipeline,
            templates,
            static_dir: args.static_dir.clone(),
            max_upload_bytes: args.max_upload_bytes,
        })
    }
}

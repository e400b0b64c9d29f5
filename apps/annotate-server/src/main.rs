//! PDF Annotation Server
//!
//! Lets a user upload a PDF, preview it in the browser, submit a text
//! annotation (with an optional PNG signature) and download the result.
//!
//! ## Routes
//!
//! - `GET /` landing page with upload form and document list
//! - `POST /upload` multipart `file` part, redirects to the edit view
//! - `GET /edit/:filename` preview with the original embedded as base64
//! - `POST /save/:filename` renders and stores the annotated document
//! - `GET /download/:filename` streams the annotated document
//! - `GET /static/*` static assets
//! - `GET /health` liveness probe
//!
//! The downloaded document is a new single page holding only the
//! annotation; content of the uploaded PDF is not carried over.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod error;
mod handlers;
mod pages;
mod state;

use state::AppState;

/// Command-line arguments for the annotation server
#[derive(Parser, Debug, Clone)]
#[command(name = "annotate-server")]
#[command(about = "Upload, preview and annotate PDF documents")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Directory holding the `uploads/` and `output/` partitions
    #[arg(long, env = "DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Directory with `index.html` and `edit.html` overrides
    #[arg(long, env = "TEMPLATES_DIR", default_value = "templates")]
    pub templates_dir: PathBuf,

    /// Directory served under `/static`
    #[arg(long, env = "STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Largest accepted request body in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "52428800")]
    pub max_upload_bytes: usize,

    /// Filesystem operation timeout in milliseconds (0 disables)
    #[arg(long, env = "IO_TIMEOUT_MS", default_value = "5000")]
    pub io_timeout_ms: u64,

    /// Render timeout in milliseconds (0 disables)
    #[arg(long, env = "RENDER_TIMEOUT_MS", default_value = "10000")]
    pub render_timeout_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = ServeDir::new(&state.static_dir);
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/upload", post(handlers::upload))
        .route("/edit/:filename", get(handlers::edit))
        .route("/save/:filename", post(handlers::save))
        .route("/download/:filename", get(handlers::download))
        .nest_service("/static", static_files)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive(log_level.into())
                .add_directive("tower_http=debug".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Initializing annotation server...");
    let state = Arc::new(AppState::from_args(&args)?);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Max upload size: {} bytes", args.max_upload_bytes);

    axum::serve(listener, app).await?;

    Ok(())
}

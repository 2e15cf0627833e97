//! # Stowage HTTP
//!
//! `stowage_http` provides the resumable-upload HTTP surface, generic over the
//! [`stowage_core::UploadService`] trait and therefore compatible with any backend
//! implementation.
//!
//! ## Example `main.rs`
//!
//! ```rust,ignore
//! use stowage_backend_redis::RedisBackendConfig;
//! use stowage_http::Stowage;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config: RedisBackendConfig = serde_yaml::from_str(&config_text)?;
//!     let service = config.new_service().await?;
//!     let stowage = Stowage::new(service, "stowage", env!("CARGO_PKG_VERSION"));
//!
//!     axum::Server::bind(&"0.0.0.0:5079".parse()?)
//!         .serve(stowage.router().into_make_service())
//!         .await?;
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{self, HeaderValue};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{self, TraceLayer};

use stowage_core::UploadService;

mod errors;

pub mod response;
pub use response::ApiResponse;

pub(crate) mod uploads;

/// Shared state injected into every route handler.
#[derive(Clone)]
pub(crate) struct AppState<S> {
    pub(crate) service: S,
    pub(crate) app_name: Arc<str>,
    pub(crate) version: Arc<str>,
}

/// Builds the upload API router around an [`UploadService`] implementation.
#[derive(Clone)]
pub struct Stowage<S> {
    service: S,
    app_name: String,
    version: String,
}

impl<S: UploadService> Stowage<S> {
    pub fn new(service: S, app_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service,
            app_name: app_name.into(),
            version: version.into(),
        }
    }

    /// Return an [`axum::Router`] serving the upload API under `/v1` plus the
    /// liveness probe at `/`.
    pub fn router(&self) -> Router {
        let state = AppState {
            service: self.service.clone(),
            app_name: Arc::from(self.app_name.as_str()),
            version: Arc::from(self.version.as_str()),
        };

        Router::new()
            .route("/", get(root::<S>))
            .route("/v1/files/jobs", post(uploads::upload_pre::<S>))
            .route("/v1/files/chunks", post(uploads::upload_chunks::<S>))
            .route("/v1/files", post(uploads::on_success::<S>))
            .route("/v1/upload/status/:job_id", get(uploads::get_status::<S>))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace::DefaultMakeSpan::new())
                    .on_response(trace::DefaultOnResponse::new())
                    .on_request(trace::DefaultOnRequest::new()),
            )
            .layer(CorsLayer::permissive())
            .layer(SetResponseHeaderLayer::if_not_present(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ))
            .with_state(state)
    }
}

async fn root<S: UploadService>(State(state): State<AppState<S>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "name": &*state.app_name,
        "version": &*state.version,
    }))
}

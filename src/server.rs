//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Plain-text greeting |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/projects` | Projects matching the query-string filter |
//! | `GET`  | `/thoughts` | Thoughts matching the query-string filter |
//! | `GET`  | `/skills` | Skills matching the query-string filter |
//! | `POST` | `/thoughts` | Relay the multipart `image` field to the image host |
//!
//! Every query parameter on the collection routes is an exact-match
//! condition (see [`crate::filter`]). Anything else falls through to `404`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": "Could not fetch any projects" }
//! ```
//!
//! Read failures of any kind answer `400` with that fixed message on all
//! three collections; the cause is logged, never returned. A `POST
//! /thoughts` without an `image` file part answers `400`, a body over the
//! upload limit `413`, a failed upload `500`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::filter::Filter;
use crate::models::{Model, Project, Record, Skill, Thought};
use crate::seed::{seed_database, Datasets};
use crate::store::DocumentStore;
use crate::upload::{CloudinaryHost, ImageHost, UploadFile};
use crate::{db, migrate};

/// Message returned for every failed collection read.
pub const FETCH_ERROR: &str = "Could not fetch any projects";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: DocumentStore,
    pub images: Arc<dyn ImageHost>,
    pub greeting: Arc<str>,
}

/// Starts the HTTP server with the Cloudinary image host.
///
/// Connects to the database, creates the schema, reseeds the content
/// collections when `seed.reset_db` is set, then serves until Ctrl+C or
/// SIGTERM.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let images = CloudinaryHost::new(&config.cloudinary, &config.upload)?;
    run_server_with_host(config, Arc::new(images), Datasets::bundled()?).await
}

/// Like [`run_server`], but with a caller-supplied image host and seed data.
pub async fn run_server_with_host(
    config: &Config,
    images: Arc<dyn ImageHost>,
    datasets: Datasets,
) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::create_schema(&pool).await?;
    let store = DocumentStore::new(pool);

    // Seeding finishes before the listener exists, so no request sees a
    // half-filled collection.
    if config.seed.reset_db {
        info!("RESET_DB set, reseeding collections");
        seed_database(&store, &datasets).await?;
    }

    let state = AppState {
        store,
        images,
        greeting: Arc::from(config.server.greeting.as_str()),
    };
    let app = router(state, config.upload.max_bytes);

    let bind_addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server running on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

/// Build the router over `state`. `max_upload_bytes` caps request bodies.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/projects", get(handle_list::<Project>))
        .route(
            "/thoughts",
            get(handle_list::<Thought>).post(handle_upload_image),
        )
        .route("/skills", get(handle_list::<Skill>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// ============ GET / ============

async fn handle_root(State(state): State<AppState>) -> String {
    state.greeting.to_string()
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /projects, /thoughts, /skills ============

/// Every record of `M` matching the query string, in store order.
async fn handle_list<M: Model>(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Record<M>>>, AppError> {
    let result = match Filter::parse::<M>(&params) {
        Ok(filter) => state.store.find::<M>(&filter).await,
        Err(e) => Err(e.into()),
    };

    let records = result.map_err(|e| {
        warn!(collection = M::COLLECTION, error = %e, "fetch failed");
        AppError::bad_request(FETCH_ERROR)
    })?;

    Ok(Json(records))
}

// ============ POST /thoughts ============

const NO_IMAGE: &str = "No image attached";

fn multipart_error(e: MultipartError) -> AppError {
    warn!(error = %e, "malformed multipart body");
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "Image too large".to_string(),
        }
    } else {
        AppError::bad_request("Malformed multipart body")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    image_url: String,
    image_id: String,
}

/// Forward the `image` file part to the image host. Other fields are ignored.
async fn handle_upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| {
        warn!(error = %e, "upload without a multipart body");
        AppError::bad_request(NO_IMAGE)
    })?;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        // Text parts named `image` carry no file.
        if field.name() != Some("image") || field.file_name().is_none() {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        file = Some(UploadFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let file = file.ok_or_else(|| AppError::bad_request(NO_IMAGE))?;
    let size = file.bytes.len();

    let hosted = state.images.upload(file).await.map_err(|e| {
        warn!(error = %e, "image upload failed");
        AppError::internal("Could not upload image")
    })?;

    info!(size, image_id = %hosted.id, "image uploaded");

    Ok(Json(UploadResponse {
        image_url: hosted.url,
        image_id: hosted.id,
    }))
}

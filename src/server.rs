//! HTTP front end.
//!
//! Serves the upload form, accepts archive uploads, and answers search
//! queries with JSON. The [`Store`] is opened once at startup and shared
//! with every handler through axum's `State` extractor.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Search page |
//! | `GET`  | `/upload` | Upload form |
//! | `POST` | `/upload` | Ingest a multipart `zipfile`, then redirect to `/` |
//! | `GET`  | `/search?q=` | Ranked results as `{"tweets": [...]}` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "invalid_archive", "message": "invalid tweet archive zipfile (missing: ...)" } }
//! ```
//!
//! Error codes: `bad_request` (400), `too_large` (413), and the ingestion
//! codes `invalid_archive`, `parse_error`, `field_error`, `store_error`,
//! `internal` (500).

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::archive::UploadBuffer;
use crate::config::Config;
use crate::error::{ArchiveError, Error, ParseError, ParseErrorKind};
use crate::ingest::ingest_archive;
use crate::models::TweetResponse;
use crate::search::search;
use crate::store::Store;

const INDEX_HTML: &str = include_str!("../assets/index.html");
const UPLOAD_HTML: &str = include_str!("../assets/upload.html");

/// Name of the multipart field carrying the archive.
pub const UPLOAD_FIELD: &str = "zipfile";

#[derive(Clone)]
struct AppState {
    store: Store,
    config: Arc<Config>,
}

/// Builds the application router around an already-open store.
pub fn router(store: Store, config: Arc<Config>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/upload", get(handle_upload_form).post(handle_upload))
        .route("/search", get(handle_search))
        .route("/health", get(handle_health))
        // uploads are bounded by UploadBuffer instead
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { store, config })
}

/// Starts the HTTP server.
///
/// Opens the store, makes sure the schema exists, and serves until Ctrl-C.
/// `bind` overrides `[server].bind` when given.
pub async fn run_server(config: &Config, bind: Option<String>) -> anyhow::Result<()> {
    let bind_addr = bind.unwrap_or_else(|| config.server.bind.clone());

    let store = Store::open(&config.db).await?;
    if store.ensure_schema().await? {
        info!(db = %config.db.path.display(), "created schema");
    }

    let app = router(store.clone(), Arc::new(config.clone()));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "listening");
    println!("tweetarchive listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::Archive(ArchiveError::TooLarge { .. })
            | Error::Parse(ParseError {
                kind: ParseErrorKind::TooLarge { .. },
                ..
            }) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(code = err.code(), error = %err, "request failed");
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ Pages ============

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn handle_upload_form() -> Html<&'static str> {
    Html(UPLOAD_HTML)
}

// ============ POST /upload ============

/// Buffers the `zipfile` field and ingests it before responding.
///
/// The body is read chunk by chunk so an oversized upload is rejected as
/// soon as it crosses the limit, before the rest is received.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let limit = state.config.upload.max_archive_bytes;
    let mut upload = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let mut buffer = UploadBuffer::new(limit);
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| bad_request(e.body_text()))?
        {
            buffer.push(&chunk).map_err(Error::from)?;
        }
        upload = Some(buffer);
        break;
    }

    let buffer = upload
        .ok_or_else(|| bad_request(format!("missing multipart field `{}`", UPLOAD_FIELD)))?;
    // a form submitted without choosing a file still sends an empty part
    if buffer.is_empty() {
        return Err(bad_request("no archive selected"));
    }
    info!(bytes = buffer.len(), "received archive");

    let archive = buffer.into_archive().map_err(Error::from)?;
    let report = ingest_archive(&state.store, archive).await?;
    info!(
        shards = report.shards,
        tweets = report.tweets,
        "upload complete"
    );

    Ok(Redirect::to("/"))
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct SearchResponse {
    tweets: Vec<TweetResponse>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    info!(q = %params.q, "search");
    let mut results = search(&state.store, &params.q)
        .await
        .map_err(Error::from)?;
    if let Some(max) = state.config.search.max_results {
        results.truncate(max);
    }
    Ok(Json(SearchResponse {
        tweets: results.iter().map(TweetResponse::from).collect(),
    }))
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

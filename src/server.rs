//! JSON HTTP front end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a query, optionally from an uploaded document |
//! | `GET`  | `/status` | Configuration report |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # `/ask` request
//!
//! ```json
//! { "query": "What changed in Q3?",
//!   "file": { "name": "report.pdf", "content_base64": "JVBERi0..." } }
//! ```
//!
//! `file` is optional. Without it the answer comes from the search index.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! A body that is not valid JSON, or lacks `query`, is a `bad_request`.
//!
//! Error codes: `bad_request` (400), `unsupported_format` (415),
//! `no_text_extracted` (422), `completion_failed` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser page can
//! call the API directly.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::ask::{handle_request, render_markdown, AnswerMode, Outcome};
use crate::config::Config;
use crate::generator::{configuration_notice, ResponseGenerator};
use crate::models::{Notice, Upload};
use crate::status::{get_status, StatusReport};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    generator: Arc<ResponseGenerator>,
}

impl AppState {
    pub fn new(config: Arc<Config>, generator: Arc<ResponseGenerator>) -> Self {
        Self { config, generator }
    }
}

/// Starts the server on `[server].bind` with clients built from `config`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let generator = Arc::new(ResponseGenerator::from_config(config));
    let state = AppState::new(Arc::new(config.clone()), generator);
    serve(&config.server.bind, state).await
}

/// Binds `addr` and serves `state` until the process ends.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    if let Some(notice) = configuration_notice(&state.config) {
        tracing::warn!("{}", notice);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        "docqa server listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/status", get(handle_status))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
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
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

/// Maps the notices of a skipped request to a status code.
fn skipped_error(notices: &[Notice]) -> AppError {
    let message = notices
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    if notices
        .iter()
        .any(|n| matches!(n, Notice::UnsupportedFormat(_)))
    {
        AppError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format", message)
    } else {
        AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "no_text_extracted", message)
    }
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

// ============ GET /status ============

async fn handle_status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(get_status(&state.config))
}

// ============ POST /ask ============

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: String,
    #[serde(default)]
    pub file: Option<FilePayload>,
}

#[derive(Debug, Deserialize)]
pub struct FilePayload {
    pub name: String,
    pub content_base64: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub request_id: String,
    pub mode: AnswerMode,
    pub answer: String,
    pub references: Vec<String>,
    pub cached: bool,
    pub stored_at: DateTime<Utc>,
    pub notices: Vec<Notice>,
    /// The answer as the CLI prints it.
    pub rendered: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let request_id = uuid::Uuid::new_v4().to_string();

    let Json(req) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;

    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let upload = match req.file {
        Some(file) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(file.content_base64.as_bytes())
                .map_err(|e| bad_request(format!("file.content_base64 is not valid base64: {}", e)))?;
            Some(Upload::new(file.name, bytes))
        }
        None => None,
    };

    tracing::info!(
        request_id = %request_id,
        with_file = upload.is_some(),
        "handling ask request"
    );

    let outcome = handle_request(&state.generator, &req.query, upload)
        .await
        .map_err(|e| {
            tracing::error!(request_id = %request_id, error = %e, "completion failed");
            AppError::new(StatusCode::BAD_GATEWAY, "completion_failed", e.to_string())
        })?;

    let rendered = render_markdown(&outcome);
    match outcome {
        Outcome::Answered { mode, answer } => Ok(Json(AskResponse {
            request_id,
            mode,
            answer: answer.text,
            references: answer.references,
            cached: answer.cached,
            stored_at: answer.stored_at,
            notices: answer.notices,
            rendered,
        })),
        Outcome::Skipped { notices } => Err(skipped_error(&notices)),
    }
}

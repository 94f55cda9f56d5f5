//! HTTP API server.
//!
//! Serves the question-answering and lookup routes consumed by the web
//! frontend:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/query?query=…` | Semantic retrieval + generated answer with sources |
//! | `GET`  | `/api/database?query=…` | Substring lookup on HTS numbers |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses use a structured body:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Query text is required" } }
//! ```
//!
//! Codes: `bad_request` (400), `not_found` (404), `model_mismatch` (409),
//! `embedding_backend`/`answer_backend` (502), `store_error`/`internal` (500).
//! An empty retrieval is not an error — `/api/query` answers with the
//! no-relevant-data sentinel and a placeholder source list.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support the
//! browser-based frontend.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::answer;
use crate::config::Config;
use crate::db;
use crate::error::Error;
use crate::models::ExactMatch;
use crate::search;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

/// Start the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/query", get(handle_query))
        .route("/api/database", get(handle_database))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("Tarix server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an HTTP response.
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Map pipeline errors to their HTTP representation. Client mistakes are
/// 4xx and retryable backend failures are 502, so callers can distinguish
/// what to retry.
fn app_error(err: Error) -> AppError {
    match err {
        Error::InvalidQuery => bad_request("Query text is required"),
        Error::ModelMismatch { .. } => AppError {
            status: StatusCode::CONFLICT,
            code: "model_mismatch".to_string(),
            message: err.to_string(),
        },
        Error::EmbeddingBackend(_) => AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "embedding_backend".to_string(),
            message: err.to_string(),
        },
        Error::AnswerBackend(_) => AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "answer_backend".to_string(),
            message: err.to_string(),
        },
        Error::Store(_) => AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "store_error".to_string(),
            message: err.to_string(),
        },
        Error::MalformedRecord(_) => internal(err.to_string()),
    }
}

// ============ Handlers ============

#[derive(Deserialize)]
struct QueryParams {
    #[serde(default)]
    query: String,
}

async fn handle_query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<answer::AskOutcome>, AppError> {
    let question = params.query.trim();
    if question.is_empty() {
        return Err(bad_request("Query text is required"));
    }

    tracing::info!(len = question.len(), "query request");

    let pool = db::connect(&state.config)
        .await
        .map_err(|e| internal(e.to_string()))?;
    let outcome = answer::ask(&state.config, &pool, question).await;
    pool.close().await;

    outcome.map(Json).map_err(app_error)
}

#[derive(Serialize)]
struct DatabaseResponse {
    results: Vec<ExactMatch>,
}

async fn handle_database(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<DatabaseResponse>, AppError> {
    let partial = params.query.trim();
    if partial.is_empty() {
        return Err(bad_request("Query text is required"));
    }

    tracing::info!(len = partial.len(), "database lookup request");

    let pool = db::connect(&state.config)
        .await
        .map_err(|e| internal(e.to_string()))?;
    let results = search::exact_match(&pool, partial, state.config.retrieval.lookup_limit).await;
    pool.close().await;

    let results = results.map_err(app_error)?;
    if results.is_empty() {
        return Err(not_found("No results found"));
    }

    Ok(Json(DatabaseResponse { results }))
}

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

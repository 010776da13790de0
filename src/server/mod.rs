//! HTTP API: health, indexing status, and the question endpoint.
//!
//! The server starts accepting connections immediately; indexing happens in
//! the background and `/query` answers 503 until the pipeline is ready, so a
//! slow bulk ingestion never blocks the listener.

use crate::query::QueryEngine;
use crate::RagserveError;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Lifecycle of the background indexing pipeline.
pub enum RagState {
    NotStarted,
    Loading,
    Loaded(Arc<QueryEngine>),
    Failed(String),
}

impl RagState {
    fn label(&self) -> &'static str {
        match self {
            RagState::NotStarted => "not_started",
            RagState::Loading => "loading",
            RagState::Loaded(_) => "loaded",
            RagState::Failed(_) => "failed",
        }
    }

    fn initialized(&self) -> bool {
        matches!(self, RagState::Loaded(_))
    }
}

/// Shared handler state. Cloned per request; the inner lock is written only
/// by the background initialization task.
#[derive(Clone)]
pub struct AppState {
    rag: Arc<RwLock<RagState>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            rag: Arc::new(RwLock::new(RagState::NotStarted)),
        }
    }

    pub fn with_state(state: RagState) -> Self {
        Self {
            rag: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn set(&self, state: RagState) {
        *self.rag.write().await = state;
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    question: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

async fn root_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let rag = state.rag.read().await;
    Json(serde_json::json!({
        "message": "Server is running",
        "rag_status": rag.label(),
        "rag_initialized": rag.initialized(),
    }))
}

async fn status_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let rag = state.rag.read().await;
    Json(serde_json::json!({
        "server": "running",
        "rag": {
            "status": rag.label(),
            "initialized": rag.initialized(),
        },
    }))
}

async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    // Malformed JSON gets the same {error} envelope as every other failure.
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    // Clone the engine handle out so the lock is not held across the answer.
    let engine = {
        let rag = state.rag.read().await;
        match &*rag {
            RagState::Loaded(engine) => Arc::clone(engine),
            RagState::Failed(message) => {
                return error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    format!("Indexing failed: {}", message),
                );
            }
            _ => {
                return error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Documents are still being indexed, try again shortly",
                );
            }
        }
    };

    match engine.answer(&request.question).await {
        Ok(answer) => (StatusCode::OK, Json(answer)).into_response(),
        Err(RagserveError::InvalidInput(message)) => {
            error_response(StatusCode::BAD_REQUEST, message)
        }
        Err(e) => {
            log::error!("query failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/status", get(status_handler))
        .route("/query", post(query_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn run(port: u16, state: AppState) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("HTTP server listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

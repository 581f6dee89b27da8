//! HTTP server.
//!
//! Exposes the retrieval service as a small JSON API for the ilaria web
//! frontend.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Readiness, model, and index size |
//! | `POST` | `/api/chat` | Answer a question grounded in the knowledge base |
//! | `POST` | `/chat` | Alias of `/api/chat` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "empty_query", "message": "გთხოვთ დაწეროთ თქვენი კითხვა" } }
//! ```
//!
//! Error codes: `empty_query` (400), `message_too_long` (400),
//! `service_unavailable` (503), `processing_error` (500). Messages are
//! fixed, user-facing Georgian strings; the underlying error is only logged.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser frontend
//! can be served from any host.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use ilaria_rag_core::models::{Answer, ConversationTurn};
use ilaria_rag_core::{RagError, RetrievalService};

use crate::config::Config;

/// Longest accepted chat message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

const SERVICE_NAME: &str = "ilaria-rag";

const MSG_EMPTY_QUERY: &str = "გთხოვთ დაწეროთ თქვენი კითხვა";
const MSG_TOO_LONG: &str = "შეტყობინება ძალიან გრძელია";
const MSG_SERVICE_UNAVAILABLE: &str = "სერვისი დროებით მიუწვდომელია";
const MSG_PROCESSING_ERROR: &str = "შეცდომა დამუშავებისას";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// `None` when startup could not bring the service up.
    service: Option<Arc<RetrievalService>>,
    /// Configured model name, reported by `/health` even when degraded.
    model: String,
}

impl AppState {
    pub fn new(service: Option<Arc<RetrievalService>>, model: impl Into<String>) -> Self {
        Self {
            service,
            model: model.into(),
        }
    }
}

/// Build the router with all routes and layers attached.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/chat", post(handle_chat))
        .route("/chat", post(handle_chat))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the service and serve HTTP on `[server].bind` until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = crate::service::start_service(config).await?;
    if service.is_none() {
        tracing::warn!("starting in degraded mode; chat requests will return 503");
    }

    let app = router(AppState::new(service, config.llm.model.clone()));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "ilaria server listening");
    println!("ilaria server listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;
    Ok(())
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

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message.to_string(),
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn empty_query() -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "empty_query",
        message: MSG_EMPTY_QUERY,
    }
}

fn message_too_long() -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "message_too_long",
        message: MSG_TOO_LONG,
    }
}

fn service_unavailable() -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "service_unavailable",
        message: MSG_SERVICE_UNAVAILABLE,
    }
}

fn processing_error() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "processing_error",
        message: MSG_PROCESSING_ERROR,
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    rag_service_ready: bool,
    model: String,
    vector_store_docs: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (model, docs) = match &state.service {
        Some(service) => (service.model_name().to_string(), service.document_count()),
        None => (state.model.clone(), 0),
    };
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        rag_service_ready: state.service.is_some(),
        model,
        vector_store_docs: docs,
    })
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    conversation_history: Vec<ConversationTurn>,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Answer>, AppError> {
    if req.message.trim().is_empty() {
        return Err(empty_query());
    }
    if req.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(message_too_long());
    }

    let service = state.service.as_ref().ok_or_else(service_unavailable)?;

    match service.answer(&req.message, &req.conversation_history).await {
        Ok(answer) => Ok(Json(answer)),
        Err(RagError::EmptyQuery) => Err(empty_query()),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", anyhow::Error::new(e)), "chat request failed");
            Err(processing_error())
        }
    }
}

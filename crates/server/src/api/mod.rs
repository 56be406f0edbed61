use crate::config::{AppState, ServerConfig};
use crate::websocket;
use anyhow::Result;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stepwise_core::types::{StepId, WorkflowId};
use stepwise_core::CommandError;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

mod handlers;

/// Start the API server
pub async fn serve(addr: &str, config: ServerConfig) -> Result<()> {
    let state = AppState::new(&config)?;

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the API router
pub(crate) fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route(
            "/api/workflows",
            get(handlers::list_workflows).post(handlers::create_workflow),
        )
        .route("/api/workflows/{workflow_id}", get(handlers::get_workflow))
        .route(
            "/api/workflows/{workflow_id}/commands",
            get(handlers::list_commands).post(handlers::create_command),
        )
        .route("/api/workflows/{workflow_id}/undo", post(handlers::undo))
        .route("/api/workflows/{workflow_id}/redo", post(handlers::redo))
        .route(
            "/api/workflows/{workflow_id}/steps/{step_id}/cached",
            post(handlers::record_cached_result),
        )
        .route("/api/ws/{workflow_id}", get(websocket::ws_handler))
        // Middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "stepwise",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Custom error type for API handlers
pub struct ApiError {
    status: StatusCode,
    error: anyhow::Error,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: anyhow::anyhow!(message.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // A corrupt log is an internal matter; don't leak its details
        if let Some(CommandError::CorruptLog(_)) = self.error.downcast_ref::<CommandError>() {
            return (self.status, Json(ErrorResponse::new("operation failed"))).into_response();
        }

        let error_msg = self.error.to_string();
        let details = self
            .error
            .chain()
            .skip(1)
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(": ");

        let response = if details.is_empty() {
            ErrorResponse::new(error_msg)
        } else {
            ErrorResponse::with_details(error_msg, details)
        };

        (self.status, Json(response)).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let error = err.into();
        let status = match error.downcast_ref::<CommandError>() {
            Some(CommandError::WorkflowNotFound(_)) => StatusCode::NOT_FOUND,
            Some(CommandError::InvalidOperation(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, error }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn parse_workflow_id(raw: &str) -> ApiResult<WorkflowId> {
    uuid::Uuid::parse_str(raw)
        .map(WorkflowId)
        .map_err(|_| ApiError::bad_request(format!("Invalid workflow id: {}", raw)))
}

pub(crate) fn parse_step_id(raw: &str) -> ApiResult<StepId> {
    uuid::Uuid::parse_str(raw)
        .map(StepId)
        .map_err(|_| ApiError::bad_request(format!("Invalid step id: {}", raw)))
}

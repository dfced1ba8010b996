//! Request/response front-end
//!
//! `POST /refresh` runs one refresh and answers with the rows that were
//! loaded. A failed run answers 500 and leaves the table as it was.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn, Level};

use crate::models::NormalizedMetadataRecord;
use crate::pipeline::{MetadataPipeline, PipelineAbort};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<MetadataPipeline>,
}

/// Body of `POST /refresh`. An empty body is the same as `{}`.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub content: Vec<NormalizedMetadataRecord>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/refresh", post(refresh))
        .route("/metadata", get(list_metadata))
        .route("/status", get(status))
        .route("/health", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

async fn refresh(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: RefreshRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RefreshRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    if !request.keys.is_empty() {
        // The table is always fully replaced, so a key subset cannot be honored
        warn!(
            requested = request.keys.len(),
            "Ignoring requested keys; refreshing the full catalog"
        );
    }

    let report = state.pipeline.run().await?;
    Ok(Json(RefreshResponse {
        content: report.records,
    })
    .into_response())
}

async fn list_metadata(State(state): State<AppState>) -> Result<Response, ApiError> {
    let rows = state
        .pipeline
        .store()
        .list_all()
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(Json(json!({ "content": rows })).into_response())
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "last_run": state.pipeline.last_run() }))
}

async fn health(State(state): State<AppState>) -> Response {
    match state.pipeline.store().count().await {
        Ok(rows) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "database": "connected", "rows": rows })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Database health check failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        },
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unavailable(String),
    Aborted(PipelineAbort),
}

impl From<PipelineAbort> for ApiError {
    fn from(abort: PipelineAbort) -> Self {
        Self::Aborted(abort)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, stage) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, None),
            ApiError::Unavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message, None),
            ApiError::Aborted(abort) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                abort.error.to_string(),
                Some(abort.stage),
            ),
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "stage": stage,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }

    // An in-flight refresh either commits or rolls back; give it a moment
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}

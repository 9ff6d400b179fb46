//! HTTP API server for the oracle.
//!
//! A ledger bridge pushes `AuthenticationRequest` envelopes into the oracle's
//! bounded channel; operators read status counters and abandoned submissions.

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use biolock_core::EventPosition;
use biolock_ledger::RequestEnvelope;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::OracleError;
use crate::state::{FailedSubmission, OracleState, StatusSnapshot};

// --- Response types ---

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub account: String,
    #[serde(flatten)]
    pub counters: StatusSnapshot,
}

#[derive(Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
    pub position: EventPosition,
}

#[derive(Serialize)]
pub struct FailedResponse {
    pub failed: Vec<FailedSubmission>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// --- Handlers ---

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

async fn handle_status(State(state): State<Arc<OracleState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        account: state.account.to_string(),
        counters: state.snapshot(),
    })
}

async fn handle_failed(State(state): State<Arc<OracleState>>) -> Json<FailedResponse> {
    let failed = state.failed_submissions();
    let count = failed.len();
    Json(FailedResponse { failed, count })
}

async fn handle_authentication_request(
    State(state): State<Arc<OracleState>>,
    Json(envelope): Json<RequestEnvelope>,
) -> Result<(StatusCode, Json<QueuedResponse>), (StatusCode, Json<ErrorResponse>)> {
    let position = envelope.position;
    tracing::debug!(
        user = %envelope.request.user,
        cred_id = %envelope.request.cred_id,
        block = position.block,
        "request received over HTTP"
    );
    match state.enqueue(envelope) {
        Ok(()) => Ok((
            StatusCode::ACCEPTED,
            Json(QueuedResponse {
                queued: true,
                position,
            }),
        )),
        Err(e @ (OracleError::ChannelFull | OracleError::ChannelClosed)) => {
            tracing::warn!(block = position.block, error = %e, "request refused");
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}

// --- Server ---

pub fn build_router(state: Arc<OracleState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/failed", get(handle_failed))
        .route(
            "/api/v1/events/authentication-request",
            post(handle_authentication_request),
        )
        .with_state(state)
}

pub async fn start_api_server(
    listen_addr: SocketAddr,
    state: Arc<OracleState>,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app).await?;
    Ok(())
}

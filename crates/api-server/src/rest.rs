//! Operational endpoints: health, readiness and liveness probes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use grc_management::ManagementState;
use serde::Serialize;
use std::time::Instant;
use utoipa::ToSchema;

/// Shared state for the operational endpoints.
#[derive(Clone)]
pub struct AppState {
    pub management: ManagementState,
    pub node_id: String,
    pub start_time: Instant,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub policies_loaded: usize,
    pub audit_chain_valid: bool,
}

/// GET /health — Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — Readiness probe for Kubernetes.
/// Ready once the baseline policies are loaded and the audit chain verifies.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses(
        (status = 200, description = "Ready to accept traffic", body = ReadinessResponse),
        (status = 503, description = "Not ready", body = ReadinessResponse)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let policies_loaded = state.management.enforcer.list_policies().len();
    let audit_chain_valid = state.management.audit.verify_chain().chain_intact;
    let ready = policies_loaded > 0 && audit_chain_valid;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadinessResponse {
            ready,
            policies_loaded,
            audit_chain_valid,
        }),
    )
}

/// GET /live — Liveness probe for Kubernetes.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

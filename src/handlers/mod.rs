pub mod payments;
pub mod webhook;

use crate::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub provider_circuit: String,
}

/// Liveness plus the provider circuit breaker state. Collaborators are not
/// probed.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthStatus {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider_circuit: state.provider.circuit_state().to_string(),
    })
}

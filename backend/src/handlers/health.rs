//! Service health for load balancers and the storefront status page

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Orders can be taken and stock can be posted
    Healthy,
    /// The process is up but the order store does not answer
    Degraded,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: ServiceStatus,
    pub version: &'static str,
    pub storage_reachable: bool,
}

/// `200` while the order store answers, `503` once it stops
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let storage_reachable = match state.store.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "Order store unreachable");
            false
        }
    };

    let (code, status) = if storage_reachable {
        (StatusCode::OK, ServiceStatus::Healthy)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, ServiceStatus::Degraded)
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            storage_reachable,
        }),
    )
}

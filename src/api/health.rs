use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::controller::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    solver: SolverHealth,
}

#[derive(Debug, Serialize)]
pub struct SolverHealth {
    mode: String,
    backend: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_seconds: Option<u64>,
}

/// GET /healthz - liveness
pub async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

/// GET /health - service and solver backend summary
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let solver = &state.cfg.solver;
    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        solver: SolverHealth {
            mode: solver.mode.to_string(),
            backend: state.service.evaluator_name(),
            timeout_seconds: solver.timeout().map(|t| t.as_secs()),
        },
    };
    (StatusCode::OK, Json(response))
}

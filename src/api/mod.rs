pub mod error;
pub mod health;
pub mod response;
pub mod runs;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::controller::AppState;

/// Request bodies carry whole network snapshots
const BODY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.cfg.server.request_timeout_secs);

    Router::new()
        .nest("/api/v1", v1(state))
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(BODY_LIMIT_BYTES))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                )),
        )
        .layer(TraceLayer::new_for_http())
}

fn v1(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/health", get(health::health_check))
        .route("/runs", post(runs::submit_run))
        .route("/runs/compute", post(runs::compute_run))
        .route("/runs/:id", get(runs::get_run))
        .route("/runs/:id/interrupt", post(runs::interrupt_run))
        .with_state(state)
}

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

use super::response::ApiResponse;
use crate::controller::{AppState, CapacityRequest};
use crate::error::CapacityError;

#[derive(Debug, Serialize)]
pub struct SubmittedRun {
    pub run_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct InterruptAck {
    pub run_id: Uuid,
    /// False when the run had already finished
    pub interrupted: bool,
}

/// POST /runs - start a computation in the background
pub async fn submit_run(
    State(state): State<AppState>,
    request: Result<Json<CapacityRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CapacityError> {
    let Json(request) = request?;
    let run_id = state.service.submit(request).await?;
    Ok((StatusCode::ACCEPTED, ApiResponse::success(SubmittedRun { run_id })))
}

/// POST /runs/compute - run to completion and return the report
pub async fn compute_run(
    State(state): State<AppState>,
    request: Result<Json<CapacityRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CapacityError> {
    let Json(request) = request?;
    let started = Instant::now();
    let report = state.service.run(request).await?;
    Ok(ApiResponse::success(report).with_duration(started.elapsed().as_millis() as u64))
}

/// GET /runs/:id
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<impl IntoResponse, CapacityError> {
    Ok(ApiResponse::success(state.service.status(run_id).await?))
}

/// POST /runs/:id/interrupt
pub async fn interrupt_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<impl IntoResponse, CapacityError> {
    let interrupted = state.service.interrupt(run_id).await?;
    Ok(ApiResponse::success(InterruptAck {
        run_id,
        interrupted,
    }))
}

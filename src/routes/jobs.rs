use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{BacktestJob, BacktestJobRequest};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_job))
        .route("/:job_id", get(get_job).delete(cancel_job))
        .route("/user/:user_id", get(user_jobs))
}

#[derive(Serialize)]
struct CreateJobResponse {
    job_id: String,
    status: &'static str,
    message: &'static str,
}

/// POST /api/backtest-jobs - Submit a new backtest job
async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<BacktestJobRequest>,
) -> Result<Json<CreateJobResponse>, AppError> {
    let job_id = state.jobs.submit(request).await?;
    Ok(Json(CreateJobResponse {
        job_id,
        status: "pending",
        message: "Backtest job created successfully",
    }))
}

/// GET /api/backtest-jobs/:job_id - Job status and details
async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<BacktestJob>, AppError> {
    let job = state.jobs.get_status(&job_id).await?;
    Ok(Json(job))
}

#[derive(Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct JobListResponse {
    jobs: Vec<BacktestJob>,
    total: usize,
}

/// GET /api/backtest-jobs/user/:user_id - A user's jobs, newest first
async fn user_jobs(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<JobListResponse>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 100);
    let jobs = state.jobs.list_for_user(&user_id, limit).await?;
    let total = jobs.len();
    Ok(Json(JobListResponse { jobs, total }))
}

#[derive(Serialize)]
struct CancelResponse {
    message: &'static str,
}

/// DELETE /api/backtest-jobs/:job_id - Cancel a pending or running job
async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<CancelResponse>, AppError> {
    if state.jobs.cancel(&job_id).await? {
        Ok(Json(CancelResponse { message: "Backtest job cancelled successfully" }))
    } else {
        Err(AppError::NotFound)
    }
}

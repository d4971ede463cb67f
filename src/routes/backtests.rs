use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::errors::AppError;
use crate::models::Backtest;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:id", get(get_backtest))
}

/// GET /api/backtests/:id - Fetch a completed backtest artifact
async fn get_backtest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Backtest>, AppError> {
    let backtest = state
        .store
        .get_backtest(&id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(backtest))
}

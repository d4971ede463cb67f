use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes::{backtests, health, jobs};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/backtest-jobs", jobs::router())
        .nest("/api/backtests", backtests::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

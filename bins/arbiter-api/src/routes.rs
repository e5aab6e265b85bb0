// Route table for the Arbiter API

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/code/run", post(handlers::run_code))
        .route("/api/code/submit", post(handlers::submit_code))
        .route("/api/problems", get(handlers::list_problems))
        .route("/api/problems/:problem_id", get(handlers::get_problem))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::export_metrics))
}

// Route definitions for the voxel gateway

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::{handlers, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/process", post(handlers::process))
        .route("/health", get(handlers::health_check))
        .route("/models", get(handlers::list_models))
        .route("/metrics", get(handlers::metrics_endpoint))
}

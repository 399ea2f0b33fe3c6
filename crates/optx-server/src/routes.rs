//! # HTTP Route Handlers
//!
//! Small handlers for service introspection. The join search preparation endpoint lives
//! in [`crate::join_graph`].
//!
//! ## Error Handling
//!
//! Errors are returned as HTTP status codes with descriptive messages:
//! - 400 Bad Request: malformed join graph (unknown table ids, invalid endpoints,
//!   capacity exceeded, selectivity out of range)

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /config: the default knobs applied when a request does not override them.
pub async fn config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config.clone())
}

//! Service descriptor and liveness check.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / - Service name, version and entry points.
pub async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "fraudgraph",
        "version": env!("CARGO_PKG_VERSION"),
        "analytics": "/api/analytics",
        "entities": state.graph.is_some(),
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "graph": state.graph.is_some(),
    }))
}

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::gateway::state::AtomicConnectionState;

/// State shared with the health endpoint. Read-only: the gateway task is
/// the single writer of the connection state.
#[derive(Clone)]
pub struct HealthState {
    pub connection: Arc<AtomicConnectionState>,
}

async fn health(State(state): State<HealthState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "gateway": state.connection.load().as_str(),
    }))
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

//! Health check endpoint.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub agent: String,
    pub actions: usize,
    pub version: String,
}

/// Health check endpoint.
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let actions = state.with_store(|store, _| store.count_actions()).await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        agent: state.agent.to_string(),
        actions,
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

use crate::AppState;
use api_contract::HealthResponse;
use axum::{Json, extract::State};

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        backend: state.backend.name().to_string(),
        state: state.backend.state().to_string(),
    })
}

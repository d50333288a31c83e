//! Telemetry 指标快照。
//!
//! - GET /metrics

use api_contract::ApiResponse;
use axum::Json;
use iot2alexa_telemetry::{MetricsSnapshot, metrics};

pub async fn get_metrics() -> Json<ApiResponse<MetricsSnapshot>> {
    Json(ApiResponse::success(metrics().snapshot()))
}

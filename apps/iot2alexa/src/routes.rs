//! 路由定义
//!
//! - 健康检查：GET /health
//! - 计数指标：GET /metrics
//! - 语音 Skill：POST <skill.path>

use crate::AppState;
use crate::handlers::{get_metrics, handle_skill, health};
use crate::middleware::request_context;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// 创建应用路由，Skill 端点挂载在配置的路径上。
pub fn create_router(state: AppState, skill_path: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route(skill_path, post(handle_skill))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 注入 request_id/trace_id
        .layer(middleware::from_fn(request_context))
}

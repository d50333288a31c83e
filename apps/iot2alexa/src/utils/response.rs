//! HTTP 错误响应辅助函数
//!
//! 语音信封以外的错误统一返回 ApiResponse 格式。

use api_contract::ApiResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// 错误请求响应
pub fn bad_request_error(code: &str, message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(code, message.into())),
    )
        .into_response()
}

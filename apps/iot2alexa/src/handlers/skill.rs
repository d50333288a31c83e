//! 语音 Skill 端点
//!
//! - POST <skill.path>
//!
//! 校验应用 ID 后，LaunchRequest / IntentRequest 读取后端当前状态并生成播报；
//! SessionEndedRequest 返回空响应。

use crate::AppState;
use crate::utils::response::bad_request_error;
use api_contract::{
    EchoRequest, EchoResponse, INTENT_REQUEST, LAUNCH_REQUEST, SESSION_ENDED_REQUEST,
};
use axum::{
    Json,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
};
use iot2alexa_telemetry::{record_skill_error, record_skill_request};
use tracing::{info, warn};

pub async fn handle_skill(State(state): State<AppState>, body: Bytes) -> Response {
    record_skill_request();
    let request: EchoRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            record_skill_error();
            warn!(target: "iot2alexa.skill", error = %err, "skill_request_invalid");
            return bad_request_error("SKILL.INVALID_REQUEST", err.to_string());
        }
    };

    if request.application_id() != Some(&*state.appid) {
        record_skill_error();
        warn!(
            target: "iot2alexa.skill",
            application_id = request.application_id().unwrap_or_default(),
            "skill_application_rejected"
        );
        return bad_request_error("SKILL.INVALID_APPLICATION", "unknown application id");
    }

    match request.request_type() {
        LAUNCH_REQUEST | INTENT_REQUEST => Json(answer(&state, &request)).into_response(),
        SESSION_ENDED_REQUEST => {
            info!(
                target: "iot2alexa.skill",
                reason = request.request.reason.as_deref().unwrap_or_default(),
                "skill_session_ended"
            );
            Json(EchoResponse::new()).into_response()
        }
        other => {
            record_skill_error();
            warn!(target: "iot2alexa.skill", request_type = other, "skill_request_unsupported");
            bad_request_error(
                "SKILL.UNSUPPORTED_REQUEST",
                format!("unsupported request type {}", other),
            )
        }
    }
}

fn answer(state: &AppState, request: &EchoRequest) -> EchoResponse {
    let message = match state.backend.data() {
        Ok(data) => state.output.output_message(&data),
        Err(err) => {
            record_skill_error();
            warn!(
                target: "iot2alexa.skill",
                backend = state.backend.name(),
                error = %err,
                "backend_data_failed"
            );
            state.output.error_message().to_string()
        }
    };
    info!(
        target: "iot2alexa.skill",
        request_type = request.request_type(),
        intent = request.intent_name().unwrap_or_default(),
        message = %message,
        "skill_answered"
    );
    EchoResponse::new()
        .output_speech(message.clone())
        .card(state.output.title(), message)
}

//! 稳定的 DTO 与 HTTP 响应契约。
//!
//! 语音助手请求/响应沿用 Alexa Skill 的 JSON 信封格式。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 语音协议版本。
pub const ECHO_VERSION: &str = "1.0";

pub const LAUNCH_REQUEST: &str = "LaunchRequest";
pub const INTENT_REQUEST: &str = "IntentRequest";
pub const SESSION_ENDED_REQUEST: &str = "SessionEndedRequest";

/// 标准 API 响应封装（语音信封以外的接口使用）。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 健康检查响应。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub ok: bool,
    pub backend: String,
    pub state: String,
}

/// 语音助手请求信封。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoRequest {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub session: Option<EchoSession>,
    #[serde(default)]
    pub context: Option<EchoContext>,
    pub request: EchoRequestBody,
}

impl EchoRequest {
    /// 应用 ID：优先取 session，其次取 context.System。
    pub fn application_id(&self) -> Option<&str> {
        let from_session = self
            .session
            .as_ref()
            .and_then(|session| session.application.as_ref());
        let from_context = self
            .context
            .as_ref()
            .and_then(|context| context.system.as_ref())
            .and_then(|system| system.application.as_ref());
        from_session
            .or(from_context)
            .map(|application| application.application_id.as_str())
    }

    pub fn request_type(&self) -> &str {
        &self.request.request_type
    }

    pub fn intent_name(&self) -> Option<&str> {
        self.request
            .intent
            .as_ref()
            .map(|intent| intent.name.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoSession {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub application: Option<EchoApplication>,
    #[serde(default)]
    pub attributes: Option<Value>,
    #[serde(default)]
    pub user: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoApplication {
    pub application_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EchoContext {
    #[serde(rename = "System", default)]
    pub system: Option<EchoSystem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoSystem {
    #[serde(default)]
    pub application: Option<EchoApplication>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoRequestBody {
    #[serde(rename = "type")]
    pub request_type: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub intent: Option<EchoIntent>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EchoIntent {
    pub name: String,
    #[serde(default)]
    pub slots: Option<Value>,
}

/// 语音助手响应信封。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EchoResponse {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub session_attributes: Option<Value>,
    pub response: EchoResponseBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EchoResponseBody {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output_speech: Option<OutputSpeech>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub card: Option<Card>,
    pub should_end_session: bool,
}

/// 播报文本（PlainText）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputSpeech {
    #[serde(rename = "type")]
    pub speech_type: String,
    pub text: String,
}

/// 卡片（Simple）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    #[serde(rename = "type")]
    pub card_type: String,
    pub title: String,
    pub content: String,
}

impl EchoResponse {
    /// 空响应，会话结束。
    pub fn new() -> Self {
        Self {
            version: ECHO_VERSION.to_string(),
            session_attributes: None,
            response: EchoResponseBody {
                output_speech: None,
                card: None,
                should_end_session: true,
            },
        }
    }

    pub fn output_speech(mut self, text: impl Into<String>) -> Self {
        self.response.output_speech = Some(OutputSpeech {
            speech_type: "PlainText".to_string(),
            text: text.into(),
        });
        self
    }

    pub fn card(mut self, title: impl Into<String>, content: impl Into<String>) -> Self {
        self.response.card = Some(Card {
            card_type: "Simple".to_string(),
            title: title.into(),
            content: content.into(),
        });
        self
    }
}

impl Default for EchoResponse {
    fn default() -> Self {
        Self::new()
    }
}

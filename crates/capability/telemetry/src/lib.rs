//! 追踪、请求 ID 与基础计数指标。

use serde::Serialize;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 日志初始化参数。
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingOptions {
    /// 未设置 RUST_LOG 时使用 debug 级别
    pub debug: bool,
    /// 以 JSON 格式输出
    pub json: bool,
}

/// 指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub payload_parse_failures: u64,
    pub values_merged: u64,
    pub extraction_failures: u64,
    pub connections: u64,
    pub connection_losses: u64,
    pub subscribe_failures: u64,
    pub skill_requests: u64,
    pub skill_errors: u64,
}

/// 进程级计数指标。
pub struct TelemetryMetrics {
    messages_received: AtomicU64,
    payload_parse_failures: AtomicU64,
    values_merged: AtomicU64,
    extraction_failures: AtomicU64,
    connections: AtomicU64,
    connection_losses: AtomicU64,
    subscribe_failures: AtomicU64,
    skill_requests: AtomicU64,
    skill_errors: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            payload_parse_failures: AtomicU64::new(0),
            values_merged: AtomicU64::new(0),
            extraction_failures: AtomicU64::new(0),
            connections: AtomicU64::new(0),
            connection_losses: AtomicU64::new(0),
            subscribe_failures: AtomicU64::new(0),
            skill_requests: AtomicU64::new(0),
            skill_errors: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            payload_parse_failures: self.payload_parse_failures.load(Ordering::Relaxed),
            values_merged: self.values_merged.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            connection_losses: self.connection_losses.load(Ordering::Relaxed),
            subscribe_failures: self.subscribe_failures.load(Ordering::Relaxed),
            skill_requests: self.skill_requests.load(Ordering::Relaxed),
            skill_errors: self.skill_errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（RUST_LOG 优先，其次按 debug 开关取 debug/info）。
pub fn init_tracing(options: TracingOptions) {
    let default_level = if options.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = if options.json {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录收到的 MQTT 消息数。
pub fn record_message_received() {
    metrics().messages_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录无法解析为 JSON 的负载数。
pub fn record_payload_parse_failure() {
    metrics()
        .payload_parse_failures
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录合并进当前状态的值数量。
pub fn record_values_merged(count: u64) {
    metrics().values_merged.fetch_add(count, Ordering::Relaxed);
}

/// 记录单规则提取失败数。
pub fn record_extraction_failures(count: u64) {
    metrics()
        .extraction_failures
        .fetch_add(count, Ordering::Relaxed);
}

/// 记录 broker 连接确认次数（含重连）。
pub fn record_connection() {
    metrics().connections.fetch_add(1, Ordering::Relaxed);
}

/// 记录连接丢失次数。
pub fn record_connection_lost() {
    metrics().connection_losses.fetch_add(1, Ordering::Relaxed);
}

/// 记录订阅失败次数。
pub fn record_subscribe_failure() {
    metrics().subscribe_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录 Skill 请求次数。
pub fn record_skill_request() {
    metrics().skill_requests.fetch_add(1, Ordering::Relaxed);
}

/// 记录以错误文案应答的 Skill 请求次数。
pub fn record_skill_error() {
    metrics().skill_errors.fetch_add(1, Ordering::Relaxed);
}

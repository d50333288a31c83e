//! MQTT 会话状态机
//!
//! 只描述状态迁移与应采取的动作，不做 I/O，事件循环根据返回的动作执行。
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Subscribed
//!       ^              |             |            |
//!       +--------------+-------------+------------+  (连接错误，按退避等待后重连)
//! ```

use std::time::Duration;

/// 订阅失败后强制断开前的宽限时间。
pub const SUBSCRIBE_FAILURE_GRACE: Duration = Duration::from_secs(1);

/// 连接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Subscribed => "subscribed",
        }
    }
}

/// 有上限的指数退避。
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// 返回本次等待时长，并把下一次翻倍（不超过上限）。
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// 订阅结果对应的动作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed,
    /// 宽限时间后断开，交给重连策略
    DisconnectAfter(Duration),
}

/// 单 topic 会话。
#[derive(Debug, Clone)]
pub struct Session {
    topic: String,
    state: ConnectionState,
    backoff: Backoff,
}

impl Session {
    pub fn new(topic: impl Into<String>, backoff: Backoff) -> Self {
        Self {
            topic: topic.into(),
            state: ConnectionState::Disconnected,
            backoff,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 发起（重新）连接。
    pub fn begin_connect(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// 收到连接确认：重置退避，返回需要订阅的 topic。
    pub fn on_connected(&mut self) -> &str {
        self.state = ConnectionState::Connected;
        self.backoff.reset();
        &self.topic
    }

    /// 订阅请求的结果（请求无法入队也算失败）。
    pub fn on_subscribe_result(&mut self, success: bool) -> SubscribeOutcome {
        if success && self.state == ConnectionState::Connected {
            self.state = ConnectionState::Subscribed;
            SubscribeOutcome::Subscribed
        } else {
            SubscribeOutcome::DisconnectAfter(SUBSCRIBE_FAILURE_GRACE)
        }
    }

    /// 连接丢失：返回重连前应等待的时长。
    pub fn on_connection_lost(&mut self) -> Duration {
        self.state = ConnectionState::Disconnected;
        self.backoff.next_delay()
    }

    /// 是否应处理该 topic 上的消息。
    pub fn accepts(&self, topic: &str) -> bool {
        matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Subscribed
        ) && topic_matches(&self.topic, topic)
    }
}

/// MQTT topic 过滤匹配，支持 `+` 与 `#` 通配符。
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(expected), Some(actual)) if expected == actual => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

//! 数据接入：采集源抽象与 MQTT 实现。

pub mod mqtt;
pub mod session;

pub use mqtt::{MqttSource, MqttSourceConfig};
pub use session::{Backoff, ConnectionState, Session, SubscribeOutcome, topic_matches};

use async_trait::async_trait;
use domain::RawMessage;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::warn;

/// 采集错误。
#[derive(Debug, Clone, thiserror::Error)]
pub enum IngestError {
    #[error("source error: {0}")]
    Source(String),
    #[error("connect error: {0}")]
    Connect(String),
    #[error("source stopped before the first connection attempt completed")]
    Stopped,
}

/// RawMessage 处理器。
#[async_trait]
pub trait RawMessageHandler: Send + Sync {
    async fn handle(&self, message: RawMessage) -> Result<(), IngestError>;
}

/// 首次连接结果通知（只会发送一次）。
#[derive(Debug, Default)]
pub struct ReadySignal {
    tx: Option<oneshot::Sender<Result<(), IngestError>>>,
}

impl ReadySignal {
    pub fn new(tx: oneshot::Sender<Result<(), IngestError>>) -> Self {
        Self { tx: Some(tx) }
    }

    /// 无人等待的信号（直接运行采集源时使用）。
    pub fn detached() -> Self {
        Self { tx: None }
    }

    /// 是否仍在等待首次连接结果。
    pub fn is_pending(&self) -> bool {
        self.tx.is_some()
    }

    pub fn notify(&mut self, result: Result<(), IngestError>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(result);
        }
    }
}

/// 采集源抽象。
///
/// `run` 在首次连接成功或失败时通过 `ready` 通知，之后持续运行直到进程退出。
#[async_trait]
pub trait Source: Send + Sync {
    async fn run(
        &self,
        handler: Arc<dyn RawMessageHandler>,
        ready: ReadySignal,
    ) -> Result<(), IngestError>;
}

/// 在后台启动采集源，等待首次连接结果后返回。
///
/// 首次连接失败时返回错误（后台任务随之结束）；成功后返回任务句柄，
/// 之后的断线重连都在后台完成。
pub async fn spawn_source(
    source: Arc<dyn Source>,
    handler: Arc<dyn RawMessageHandler>,
) -> Result<tokio::task::JoinHandle<()>, IngestError> {
    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        if let Err(err) = source.run(handler, ReadySignal::new(tx)).await {
            warn!(target: "iot2alexa.ingest", error = %err, "ingest_stopped");
        }
    });
    match rx.await {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(err)) => {
            handle.abort();
            Err(err)
        }
        Err(_) => Err(IngestError::Stopped),
    }
}

pub(crate) fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}

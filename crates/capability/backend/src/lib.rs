//! 后端抽象与注册表
//!
//! 一个后端 = 一个配置段 + 一份当前状态，对外只暴露 `name` / `init` / `data`。
//! 启动时由 [`BackendRegistry`] 按注册顺序探测全部构造器，必须恰好有一个后端的
//! 配置段存在。

pub mod handler;
pub mod mqtt;
pub mod registry;

pub use handler::MappingHandler;
pub use mqtt::{AuthConfig, MappingConfig, MqttBackend, MqttBackendConfig};
pub use registry::{BackendConstructor, BackendLookup, BackendRegistry, lookup_backend};

use async_trait::async_trait;
use domain::Snapshot;
use iot2alexa_config::ConfigError;
use iot2alexa_ingest::IngestError;
use iot2alexa_normalize::NormalizeError;

/// 后端错误。
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("invalid {backend} backend configuration: {message}")]
    Config { backend: String, message: String },
    #[error("no backend configured (known backends: {})", .known.join(", "))]
    NoBackend { known: Vec<String> },
    #[error(
        "multiple backends configured: {}. please configure only a single backend",
        .found.join(", ")
    )]
    MultipleBackends { found: Vec<String> },
    #[error("{0} backend already initialized")]
    AlreadyInitialized(String),
    #[error("{backend} backend init failed: {source}")]
    Init {
        backend: String,
        #[source]
        source: IngestError,
    },
}

impl BackendError {
    pub fn config(backend: &str, message: impl Into<String>) -> Self {
        BackendError::Config {
            backend: backend.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn from_config_error(backend: &str, err: ConfigError) -> Self {
        Self::config(backend, err.to_string())
    }

    pub(crate) fn from_normalize_error(backend: &str, err: NormalizeError) -> Self {
        Self::config(backend, err.to_string())
    }
}

/// 数据后端。
#[async_trait]
pub trait Backend: Send + Sync {
    /// 后端名称（与配置段同名）
    fn name(&self) -> &str;

    /// 启动数据接入；首次连接完成（或失败）后返回
    async fn init(&self) -> Result<(), BackendError>;

    /// 读取当前状态快照
    fn data(&self) -> Result<Snapshot, BackendError>;

    /// 运行状态描述（健康检查用）
    fn state(&self) -> &'static str {
        "ready"
    }
}

//! MQTT 后端
//!
//! 配置段 `skill.mqtt`：
//!
//! ```yaml
//! mqtt:
//!   url: tcp://broker:1883     # 或 host + port（默认 1883）
//!   topic: sensors/garden
//!   auth:
//!     user: alexa
//!     password: secret
//!   mapping:
//!     - key: temp
//!       path: $.sensor.value
//!       scale: 1.8
//!       round: true
//! ```

use crate::handler::MappingHandler;
use crate::registry::BackendLookup;
use crate::{Backend, BackendError};
use async_trait::async_trait;
use domain::Snapshot;
use iot2alexa_config::SkillConfig;
use iot2alexa_ingest::{ConnectionState, MqttSource, MqttSourceConfig, spawn_source};
use iot2alexa_normalize::{FieldMapper, MappingRule, NormalizeError};
use iot2alexa_storage::CurrentStateStore;
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

pub const NAME: &str = "mqtt";
pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_CLIENT_ID: &str = "iot2alexa";
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;
pub const DEFAULT_MAX_RECONNECT_INTERVAL_MS: u64 = 2000;
const INITIAL_RECONNECT_INTERVAL: Duration = Duration::from_millis(100);
// rumqttc 不接受 5s 以下的 keep alive
const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// 认证配置。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// 映射规则配置。
#[derive(Debug, Clone, Deserialize)]
pub struct MappingConfig {
    pub key: String,
    pub path: String,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub round: bool,
}

/// `skill.mqtt` 配置段。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MqttBackendConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub keep_alive_secs: Option<u64>,
    #[serde(default)]
    pub max_reconnect_interval_ms: Option<u64>,
    #[serde(default)]
    pub mapping: Vec<MappingConfig>,
}

impl MqttBackendConfig {
    /// 校验并转换为采集源配置与映射规则。
    pub fn validate(&self) -> Result<(MqttSourceConfig, Vec<MappingRule>), BackendError> {
        let (host, port, url_user, url_password) = self.broker()?;

        let topic = self
            .topic
            .as_deref()
            .map(str::trim)
            .filter(|topic| !topic.is_empty())
            .ok_or_else(|| BackendError::config(NAME, "no topic set"))?
            .to_string();

        let auth = self.auth.clone().unwrap_or_default();
        let username = auth.user.filter(|user| !user.is_empty()).or(url_user);
        let password = auth.password.filter(|pass| !pass.is_empty()).or(url_password);

        let keep_alive_secs = self.keep_alive_secs.unwrap_or(DEFAULT_KEEP_ALIVE_SECS);
        if keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            return Err(BackendError::config(
                NAME,
                format!("keep_alive_secs must be at least {}", MIN_KEEP_ALIVE_SECS),
            ));
        }
        let max_reconnect_ms = self
            .max_reconnect_interval_ms
            .unwrap_or(DEFAULT_MAX_RECONNECT_INTERVAL_MS);
        if max_reconnect_ms == 0 {
            return Err(BackendError::config(
                NAME,
                "max_reconnect_interval_ms must be greater than 0",
            ));
        }

        let rules = self
            .mapping
            .iter()
            .map(|mapping| {
                let mut rule = MappingRule::new(mapping.key.trim(), &mapping.path)?;
                rule.scale = mapping.scale;
                rule.round = mapping.round;
                Ok::<_, NormalizeError>(rule)
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| BackendError::from_normalize_error(NAME, err))?;

        let client_id = self
            .client_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());

        Ok((
            MqttSourceConfig {
                host,
                port,
                username,
                password,
                topic,
                client_id,
                keep_alive: Duration::from_secs(keep_alive_secs),
                initial_reconnect_interval: INITIAL_RECONNECT_INTERVAL,
                max_reconnect_interval: Duration::from_millis(max_reconnect_ms),
            },
            rules,
        ))
    }

    /// 解析 broker 地址：优先 url，否则 host + port。
    fn broker(&self) -> Result<(String, u16, Option<String>, Option<String>), BackendError> {
        if let Some(raw) = self.url.as_deref().filter(|url| !url.trim().is_empty()) {
            let url = url::Url::parse(raw.trim()).map_err(|err| {
                BackendError::config(NAME, format!("invalid url {}: {}", raw, err))
            })?;
            if !matches!(url.scheme(), "tcp" | "mqtt") {
                return Err(BackendError::config(
                    NAME,
                    format!("unsupported url scheme {} (use tcp:// or mqtt://)", url.scheme()),
                ));
            }
            let host = url
                .host_str()
                .filter(|host| !host.is_empty())
                .ok_or_else(|| BackendError::config(NAME, format!("no host in url {}", raw)))?
                .to_string();
            let port = url.port().unwrap_or(DEFAULT_PORT);
            let user = Some(url.username().to_string()).filter(|user| !user.is_empty());
            let password = url.password().map(str::to_string);
            return Ok((host, port, user, password));
        }

        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .ok_or_else(|| BackendError::config(NAME, "no mqtt host provided"))?
            .to_string();
        let port = match self.port {
            None | Some(0) => DEFAULT_PORT,
            Some(port) => port,
        };
        Ok((host, port, None, None))
    }
}

/// 后端启动阶段。
enum Lifecycle {
    Idle,
    Starting,
    Running(JoinHandle<()>),
}

/// MQTT 后端：采集源 + 字段映射 + 当前状态。
pub struct MqttBackend {
    source: Arc<MqttSource>,
    handler: Arc<MappingHandler>,
    lifecycle: Mutex<Lifecycle>,
}

impl MqttBackend {
    pub fn from_config(config: &MqttBackendConfig) -> Result<Self, BackendError> {
        let (source_config, rules) = config.validate()?;
        let mapper =
            FieldMapper::new(rules).map_err(|err| BackendError::from_normalize_error(NAME, err))?;
        let store = Arc::new(CurrentStateStore::restricted_to(mapper.keys()));
        Ok(Self {
            source: Arc::new(MqttSource::new(source_config)),
            handler: Arc::new(MappingHandler::new(mapper, store)),
            lifecycle: Mutex::new(Lifecycle::Idle),
        })
    }

    /// 注册表构造器：配置段缺失时返回 None。
    pub fn lookup(config: &SkillConfig) -> Result<Option<Arc<dyn Backend>>, BackendError> {
        let Some(section) = config
            .section_as::<MqttBackendConfig>(NAME)
            .map_err(|err| BackendError::from_config_error(NAME, err))?
        else {
            return Ok(None);
        };
        let backend = Self::from_config(&section)?;
        Ok(Some(Arc::new(backend)))
    }

    pub fn registration() -> BackendLookup {
        BackendLookup {
            name: NAME,
            construct: Self::lookup,
        }
    }

    pub fn source_config(&self) -> &MqttSourceConfig {
        self.source.config()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.source.state()
    }

    pub fn store(&self) -> &Arc<CurrentStateStore> {
        self.handler.store()
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Backend for MqttBackend {
    fn name(&self) -> &str {
        NAME
    }

    async fn init(&self) -> Result<(), BackendError> {
        // 检查与占位在同一临界区内完成，并发的 init 只有一个能进入 Starting
        {
            let mut lifecycle = self.lock_lifecycle();
            if !matches!(*lifecycle, Lifecycle::Idle) {
                return Err(BackendError::AlreadyInitialized(NAME.to_string()));
            }
            *lifecycle = Lifecycle::Starting;
        }

        let config = self.source.config();
        info!(
            target: "iot2alexa.backend",
            server = %config.server(),
            topic = %config.topic,
            client_id = %config.client_id,
            "mqtt_backend_connecting"
        );
        let result = spawn_source(self.source.clone(), self.handler.clone()).await;

        let mut lifecycle = self.lock_lifecycle();
        match result {
            Ok(handle) => {
                *lifecycle = Lifecycle::Running(handle);
                Ok(())
            }
            Err(source) => {
                *lifecycle = Lifecycle::Idle;
                Err(BackendError::Init {
                    backend: NAME.to_string(),
                    source,
                })
            }
        }
    }

    fn data(&self) -> Result<Snapshot, BackendError> {
        Ok(self.handler.store().snapshot())
    }

    fn state(&self) -> &'static str {
        self.connection_state().as_str()
    }
}

impl Drop for MqttBackend {
    fn drop(&mut self) {
        if let Lifecycle::Running(handle) = &*self.lock_lifecycle() {
            handle.abort();
        }
    }
}

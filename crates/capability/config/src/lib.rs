//! 应用运行配置加载。
//!
//! 配置来源：YAML 配置文件，少量字段可由环境变量覆盖。
//!
//! ```yaml
//! debug: false
//! server:
//!   port: 8080
//! skill:
//!   appid: amzn1.ask.skill.xxx
//!   path: /alexa
//!   mqtt:            # 后端配置段，由后端自行解析
//!     url: tcp://localhost:1883
//!     topic: sensors/garden
//!   output:
//!     title: Garden
//!     text:
//!       - key: temp
//!         format: "it is %d degrees"
//! ```

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::env;
use std::path::Path;

/// 默认 HTTP 端口。
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// 服务自身占用、不能作为 skill.path 的路径。
pub const RESERVED_PATHS: [&str; 2] = ["/health", "/metrics"];

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required config: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub debug: bool,
    pub server: ServerConfig,
    pub skill: SkillConfig,
}

/// HTTP 服务配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERVER_PORT,
        }
    }
}

/// Skill 配置：应用 ID、监听路径、输出模板以及各后端配置段。
#[derive(Debug, Clone)]
pub struct SkillConfig {
    pub appid: String,
    pub path: String,
    pub output: OutputConfig,
    sections: BTreeMap<String, serde_yml::Value>,
}

/// 输出模板配置。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub intro: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub text: Vec<TextEntry>,
}

/// 单条输出模板：key 有值时按 format 输出。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TextEntry {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub format: String,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    debug: bool,
    #[serde(default)]
    server: RawServer,
    skill: Option<RawSkill>,
}

#[derive(Debug, Default, Deserialize)]
struct RawServer {
    #[serde(default)]
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct RawSkill {
    appid: Option<String>,
    path: Option<String>,
    output: Option<OutputConfig>,
    #[serde(flatten)]
    sections: BTreeMap<String, serde_yml::Value>,
}

impl AppConfig {
    /// 读取配置文件并应用环境变量覆盖。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&content)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// 解析并校验 YAML 配置内容。
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_yml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;

        let skill = raw
            .skill
            .ok_or_else(|| ConfigError::Missing("skill".to_string()))?;
        let appid = non_empty(skill.appid)
            .ok_or_else(|| ConfigError::Missing("skill.appid".to_string()))?;
        let path = non_empty(skill.path)
            .ok_or_else(|| ConfigError::Missing("skill.path".to_string()))?;
        if !path.starts_with('/') || RESERVED_PATHS.contains(&path.as_str()) {
            return Err(ConfigError::Invalid("skill.path".to_string(), path));
        }
        let output = skill
            .output
            .ok_or_else(|| ConfigError::Missing("skill.output".to_string()))?;

        let port = match raw.server.port {
            None | Some(0) => DEFAULT_SERVER_PORT,
            Some(port) => port,
        };

        Ok(Self {
            debug: raw.debug,
            server: ServerConfig { port },
            skill: SkillConfig {
                appid,
                path,
                output,
                sections: skill.sections,
            },
        })
    }

    /// 从环境变量覆盖部分配置。
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| env::var(key).ok())
    }

    /// 使用给定的查找函数覆盖配置：
    /// - `IOT2ALEXA_SERVER_PORT`
    /// - `IOT2ALEXA_DEBUG`
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = read_optional_u16(&lookup, "IOT2ALEXA_SERVER_PORT")? {
            self.server.port = port;
        }
        if let Some(debug) = read_optional_bool(&lookup, "IOT2ALEXA_DEBUG") {
            self.debug = debug;
        }
        Ok(())
    }
}

impl SkillConfig {
    /// 以名称查找后端配置段；缺失或为空时返回 None。
    pub fn section(&self, name: &str) -> Option<&serde_yml::Value> {
        self.sections.get(name).filter(|value| !value.is_null())
    }

    /// 所有非空配置段名称（含未知后端）。
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, _)| name.as_str())
    }

    /// 将配置段反序列化为强类型配置。
    pub fn section_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ConfigError> {
        let Some(value) = self.section(name) else {
            return Ok(None);
        };
        serde_yml::from_value(value.clone())
            .map(Some)
            .map_err(|err| ConfigError::Invalid(format!("skill.{}", name), err.to_string()))
    }

    /// 测试与嵌入场景下直接构造。
    pub fn new(
        appid: impl Into<String>,
        path: impl Into<String>,
        output: OutputConfig,
        sections: BTreeMap<String, serde_yml::Value>,
    ) -> Self {
        Self {
            appid: appid.into(),
            path: path.into(),
            output,
            sections,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn read_optional_u16<F>(lookup: &F, key: &str) -> Result<Option<u16>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if value.is_empty() => Ok(None),
        Some(value) => value
            .parse::<u16>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
        None => Ok(None),
    }
}

fn read_optional_bool<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.is_empty())
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"))
}

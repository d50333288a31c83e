//! 后端注册表
//!
//! 可用后端以构造器列表的形式显式传入，没有全局注册表。查找时扫描全部构造器后
//! 再决定：零个匹配和多个匹配都是配置错误。

use crate::mqtt::MqttBackend;
use crate::{Backend, BackendError};
use iot2alexa_config::SkillConfig;
use std::sync::Arc;
use tracing::info;

/// 后端构造器：配置段缺失返回 `Ok(None)`，配置段有误返回错误。
pub type BackendConstructor =
    fn(&SkillConfig) -> Result<Option<Arc<dyn Backend>>, BackendError>;

/// 一个已知后端。
#[derive(Clone, Copy)]
pub struct BackendLookup {
    pub name: &'static str,
    pub construct: BackendConstructor,
}

impl std::fmt::Debug for BackendLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendLookup")
            .field("name", &self.name)
            .finish()
    }
}

/// 按注册顺序保存的后端构造器集合。
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    lookups: Vec<BackendLookup>,
}

impl BackendRegistry {
    pub fn new(lookups: Vec<BackendLookup>) -> Self {
        Self { lookups }
    }

    /// 编译进程序的全部后端。
    pub fn builtin() -> Self {
        Self::new(vec![MqttBackend::registration()])
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.lookups.iter().map(|lookup| lookup.name).collect()
    }

    /// 选出唯一配置的后端（仅构造，不启动）。
    pub fn lookup(&self, config: &SkillConfig) -> Result<Arc<dyn Backend>, BackendError> {
        let mut found: Vec<Arc<dyn Backend>> = Vec::new();
        for lookup in &self.lookups {
            if let Some(backend) = (lookup.construct)(config)? {
                found.push(backend);
            }
        }

        if found.len() > 1 {
            return Err(BackendError::MultipleBackends {
                found: found
                    .iter()
                    .map(|backend| backend.name().to_string())
                    .collect(),
            });
        }
        let backend = found.pop().ok_or_else(|| BackendError::NoBackend {
            known: self.names().into_iter().map(str::to_string).collect(),
        })?;
        info!(target: "iot2alexa.backend", backend = backend.name(), "backend_selected");
        Ok(backend)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// 使用内置后端列表查找。
pub fn lookup_backend(config: &SkillConfig) -> Result<Arc<dyn Backend>, BackendError> {
    BackendRegistry::builtin().lookup(config)
}

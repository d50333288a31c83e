//! 当前状态内存实现

use domain::{FieldValue, Snapshot};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// 一次合并的结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    /// 写入的 key 数量
    pub applied: usize,
    /// 不在允许集合内而被忽略的 key
    pub rejected: Vec<String>,
    /// 合并后的版本号
    pub version: u64,
}

#[derive(Debug, Default)]
struct StateInner {
    values: Snapshot,
    version: u64,
}

/// 当前状态存储
#[derive(Debug, Default)]
pub struct CurrentStateStore {
    inner: Mutex<StateInner>,
    allowed_keys: Option<HashSet<String>>,
}

impl CurrentStateStore {
    /// 创建不限制 key 的空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建只接受指定 key 的空存储（通常为映射规则的 key 集合）
    pub fn restricted_to<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Mutex::new(StateInner::default()),
            allowed_keys: Some(keys.into_iter().map(Into::into).collect()),
        }
    }

    /// 读取一致性快照（独立副本，调用方无需再同步）
    pub fn snapshot(&self) -> Snapshot {
        self.lock().values.clone()
    }

    /// 读取快照及其对应的版本号（已完成的合并次数）
    pub fn versioned_snapshot(&self) -> (u64, Snapshot) {
        let inner = self.lock();
        (inner.version, inner.values.clone())
    }

    /// 在同一临界区内写入整批 key/value
    ///
    /// 未出现在本批中的 key 保持原值。
    pub fn merge<I>(&self, values: I) -> MergeResult
    where
        I: IntoIterator<Item = (String, FieldValue)>,
    {
        let (accepted, rejected): (Vec<_>, Vec<_>) = values
            .into_iter()
            .partition(|(key, _)| self.is_allowed(key));

        let mut inner = self.lock();
        let applied = accepted.len();
        inner.values.extend(accepted);
        inner.version += 1;
        MergeResult {
            applied,
            rejected: rejected.into_iter().map(|(key, _)| key).collect(),
            version: inner.version,
        }
    }

    /// 当前 key 数量
    pub fn len(&self) -> usize {
        self.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_allowed(&self, key: &str) -> bool {
        self.allowed_keys
            .as_ref()
            .is_none_or(|keys| keys.contains(key))
    }

    // 合并在持锁期间不会 panic 到一半，中毒后数据仍然一致，直接取回
    fn lock(&self) -> MutexGuard<'_, StateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

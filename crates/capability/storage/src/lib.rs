//! # 当前状态存储
//!
//! 保存每个映射 key 的最新值，不保留历史。
//!
//! - 写入方：采集任务（同一时刻只有一个），每条消息的映射结果通过 [`CurrentStateStore::merge`]
//!   整批写入
//! - 读取方：Skill 请求处理（可并发），通过 [`CurrentStateStore::snapshot`] 获得独立副本
//!
//! 内部只有一把互斥锁，锁内只做复制/合并，不做 I/O 与解析。

pub mod state;

pub use state::{CurrentStateStore, MergeResult};

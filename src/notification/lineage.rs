//! 构建谱系状态 - 记录每个 builder 最近一次的终态结果
//!
//! 用于"失败后修复"通知：读取总是发生在本次写入之前，所以读到的
//! 一定是上一次构建的结果。没有可识别结果的构建也会覆盖记录，
//! 之后读到的就是 None。
//!
//! ## 并发
//! 同一个 builder 的读-判断-写必须串行，`LineageTracker::lock` 返回
//! 该 builder 专属的异步锁；不同 builder 之间互不阻塞。
//!
//! ## 容量
//! 记录永不过期，`LineageTracker` 的 per-builder 锁表也一样只增不减。
//! builder 集合在一个部署里基本是固定的小集合；如果 builder 名称是动态
//! 生成的（例如每个 PR 一个 builder），存储和锁表都会无限增长。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use super::event::BuildResult;

/// 谱系状态存储（可注入）
pub trait LineageStore: Send + Sync {
    /// 上次记录的结果；没有记录时返回 None
    fn last_result(&self, builder: &str) -> Option<BuildResult>;

    /// 无条件覆盖；None 表示上次构建没有可识别的结果
    fn record(&self, builder: &str, result: Option<BuildResult>);
}

/// 默认的内存存储
#[derive(Debug, Default)]
pub struct InMemoryLineageStore {
    results: RwLock<HashMap<String, Option<BuildResult>>>,
}

impl InMemoryLineageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已跟踪的 builder 数量
    pub fn len(&self) -> usize {
        self.results.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LineageStore for InMemoryLineageStore {
    fn last_result(&self, builder: &str) -> Option<BuildResult> {
        self.results
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(builder)
            .copied()
            .flatten()
    }

    fn record(&self, builder: &str, result: Option<BuildResult>) {
        self.results
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(builder.to_string(), result);
    }
}

/// 带 per-builder 串行化的谱系跟踪器
pub struct LineageTracker {
    store: Arc<dyn LineageStore>,
    /// builder -> 该 builder 的串行锁
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl LineageTracker {
    pub fn new(store: Arc<dyn LineageStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// 使用内存存储
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryLineageStore::new()))
    }

    /// 获取某个 builder 的串行锁，持有期间其他同名事件会等待
    pub async fn lock(&self, builder: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(builder.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub fn last_result(&self, builder: &str) -> Option<BuildResult> {
        self.store.last_result(builder)
    }

    pub fn record(&self, builder: &str, result: Option<BuildResult>) {
        debug!(
            builder = %builder,
            result = result.map(|r| r.label()).unwrap_or(""),
            "Recording lineage result"
        );
        self.store.record(builder, result);
    }

    /// 读取上次结果并写入本次结果，返回上次结果；调用方需持有 `lock`
    pub fn swap(&self, builder: &str, result: Option<BuildResult>) -> Option<BuildResult> {
        let previous = self.last_result(builder);
        self.record(builder, result);
        previous
    }
}

impl Default for LineageTracker {
    fn default() -> Self {
        Self::in_memory()
    }
}

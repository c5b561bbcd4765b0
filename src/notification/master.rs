//! 构建编排器接口 - 事件补全（源码版本、责任人）

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use super::event::{BuildEvent, SourceStamp};

/// 编排器提供的补全能力
#[async_trait]
pub trait BuildMaster: Send + Sync {
    /// 补全构建详情（源码版本、属性）
    async fn build_details(&self, event: &mut BuildEvent) -> Result<()>;

    /// 查询构建的责任人显示名
    async fn responsible_users(&self, build_id: i64) -> Result<Vec<String>>;
}

/// 预先准备好数据的编排器（CLI 和测试使用）
#[derive(Debug, Default, Clone)]
pub struct StaticBuildMaster {
    sourcestamps: HashMap<i64, Vec<SourceStamp>>,
    responsible: HashMap<i64, Vec<String>>,
}

impl StaticBuildMaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从已经带有补全数据的事件构建
    pub fn from_event(event: &BuildEvent) -> Self {
        Self::new()
            .with_sourcestamps(event.build_id, event.sourcestamps.clone())
            .with_responsible_users(event.build_id, event.responsible_users.clone())
    }

    pub fn with_sourcestamps(mut self, build_id: i64, stamps: Vec<SourceStamp>) -> Self {
        self.sourcestamps.insert(build_id, stamps);
        self
    }

    pub fn with_responsible_users(mut self, build_id: i64, users: Vec<String>) -> Self {
        self.responsible.insert(build_id, users);
        self
    }
}

#[async_trait]
impl BuildMaster for StaticBuildMaster {
    async fn build_details(&self, event: &mut BuildEvent) -> Result<()> {
        if let Some(stamps) = self.sourcestamps.get(&event.build_id) {
            event.sourcestamps = stamps.clone();
        }
        Ok(())
    }

    async fn responsible_users(&self, build_id: i64) -> Result<Vec<String>> {
        Ok(self.responsible.get(&build_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::event::BuildResult;

    #[tokio::test]
    async fn test_static_master_fills_sourcestamps() {
        let master = StaticBuildMaster::new()
            .with_sourcestamps(9, vec![SourceStamp::new("git://example/app", Some("abc"))]);
        let mut event = BuildEvent::finished("runtests", 9, "http://ci/9", BuildResult::Failure);
        master.build_details(&mut event).await.unwrap();
        assert_eq!(event.sourcestamps.len(), 1);
    }

    #[tokio::test]
    async fn test_static_master_unknown_build() {
        let master = StaticBuildMaster::new();
        let mut event = BuildEvent::finished("runtests", 9, "http://ci/9", BuildResult::Failure)
            .with_sourcestamp("git://example/app", None);
        master.build_details(&mut event).await.unwrap();
        assert_eq!(event.sourcestamps.len(), 1);
        assert!(master.responsible_users(9).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_from_event_roundtrips_enrichment() {
        let event = BuildEvent::finished("runtests", 3, "http://ci/3", BuildResult::Failure)
            .with_sourcestamp("git://example/app", Some("abc"))
            .with_responsible_users(["alice"]);
        let master = StaticBuildMaster::from_event(&event);
        assert_eq!(master.responsible_users(3).await.unwrap(), vec!["alice".to_string()]);
    }
}

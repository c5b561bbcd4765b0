//! 通知策略 - 何时发送、发往哪里、怎么展示

use serde::{Deserialize, Serialize};

/// 通知策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPolicy {
    /// 构建开始时是否通知
    pub report_on_start: bool,
    /// 只通知失败的构建
    pub report_only_failures: bool,
    /// 失败后恢复成功时也通知（仅在 report_only_failures 开启时有意义）
    pub report_fixed_builds: bool,
    /// 覆盖目标频道
    pub channel: Option<String>,
    /// 目标 webhook URL，可包含 `{revision}` / `{repository}` 占位符
    pub endpoints: Vec<String>,
    /// 显示用户名
    pub username: Option<String>,
    /// FINISHED 消息是否附带 attachments
    pub attachments: bool,
    /// 以 info 级别打印完整 payload
    pub verbose: bool,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            report_on_start: true,
            report_only_failures: false,
            report_fixed_builds: false,
            channel: None,
            endpoints: Vec::new(),
            username: None,
            attachments: true,
            verbose: false,
        }
    }
}

impl NotificationPolicy {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoints: vec![endpoint.into()],
            ..Self::default()
        }
    }

    pub fn report_on_start(mut self, enabled: bool) -> Self {
        self.report_on_start = enabled;
        self
    }

    pub fn report_only_failures(mut self, enabled: bool) -> Self {
        self.report_only_failures = enabled;
        self
    }

    pub fn report_fixed_builds(mut self, enabled: bool) -> Self {
        self.report_fixed_builds = enabled;
        self
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn attachments(mut self, enabled: bool) -> Self {
        self.attachments = enabled;
        self
    }

    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    /// 是否需要跟踪每个 builder 的上次结果
    pub fn tracks_lineage(&self) -> bool {
        self.report_fixed_builds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = NotificationPolicy::default();
        assert!(policy.report_on_start);
        assert!(!policy.report_only_failures);
        assert!(!policy.report_fixed_builds);
        assert!(policy.attachments);
        assert!(policy.endpoints.is_empty());
    }

    #[test]
    fn test_policy_chain() {
        let policy = NotificationPolicy::new("https://hooks.example.com/T000")
            .report_on_start(false)
            .report_only_failures(true)
            .report_fixed_builds(true)
            .channel("#ci");

        assert_eq!(policy.endpoints, vec!["https://hooks.example.com/T000"]);
        assert!(!policy.report_on_start);
        assert!(policy.tracks_lineage());
        assert_eq!(policy.channel.as_deref(), Some("#ci"));
    }
}

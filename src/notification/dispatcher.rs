//! 通知分发器 - 过滤、记录谱系、渲染、投递
//!
//! 流程：编排器事件 → 过滤 → （谱系更新）→ 渲染 → 每个源码版本投递一次

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::event::{BuildEvent, BuildStage};
use super::filter::should_notify;
use super::formatter::MessageFormatter;
use super::lineage::LineageTracker;
use super::master::BuildMaster;
use super::payload::RenderedMessage;
use super::policy::NotificationPolicy;
use super::webhook::{resolve_url, DeliveryOutcome, WebhookClient};

/// 跳过原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 策略决定不通知
    Filtered,
    /// 渲染结果为空
    EmptyMessage,
    /// dry-run 模式，只渲染不发送
    DryRun,
}

/// 一次分发的结果
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// 跳过原因（None 表示已尝试投递）
    pub skipped: Option<SkipReason>,
    /// 渲染出的消息
    pub message: Option<RenderedMessage>,
    /// 每次投递的结果
    pub deliveries: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    /// 是否决定发送（不论投递是否成功，dry-run 也算）
    pub fn notified(&self) -> bool {
        matches!(self.skipped, None | Some(SkipReason::DryRun))
    }

    /// 成功投递的次数
    pub fn delivered(&self) -> usize {
        self.deliveries.iter().filter(|d| d.is_delivered()).count()
    }
}

/// 通知分发器
pub struct NotificationDispatcher {
    policy: NotificationPolicy,
    formatter: MessageFormatter,
    client: WebhookClient,
    master: Arc<dyn BuildMaster>,
    lineage: LineageTracker,
    /// 是否为 dry-run 模式
    dry_run: bool,
}

impl NotificationDispatcher {
    /// 创建新的分发器
    pub fn new(policy: NotificationPolicy, client: WebhookClient, master: Arc<dyn BuildMaster>) -> Self {
        Self {
            policy,
            formatter: MessageFormatter::new(),
            client,
            master,
            lineage: LineageTracker::in_memory(),
            dry_run: false,
        }
    }

    /// 设置 dry-run 模式
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 替换格式化器（例如带 extra params 变换的）
    pub fn with_formatter(mut self, formatter: MessageFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// 注入谱系状态
    pub fn with_lineage(mut self, lineage: LineageTracker) -> Self {
        self.lineage = lineage;
        self
    }

    pub fn policy(&self) -> &NotificationPolicy {
        &self.policy
    }

    pub fn lineage(&self) -> &LineageTracker {
        &self.lineage
    }

    /// 处理构建开始事件
    pub async fn build_started(&self, mut event: BuildEvent) -> DispatchReport {
        if !should_notify(&event, &self.policy, None) {
            debug!(builder = %event.builder, build_id = event.build_id, "Build start not reported");
            return DispatchReport::skipped(SkipReason::Filtered);
        }

        self.enrich(&mut event).await;
        self.send(event).await
    }

    /// 处理构建结束事件
    pub async fn build_finished(&self, mut event: BuildEvent) -> DispatchReport {
        let do_send = if self.policy.tracks_lineage() {
            // 同一 builder 的补全-读-判断-写按到达顺序串行，渲染和投递不持锁
            let _guard = self.lineage.lock(&event.builder).await;
            self.enrich(&mut event).await;
            if event.result.is_none() {
                warn!(
                    builder = %event.builder,
                    build_id = event.build_id,
                    "Finished build has no recognised result"
                );
            }
            let previous = self.lineage.swap(&event.builder, event.result);
            should_notify(&event, &self.policy, previous)
        } else {
            self.enrich(&mut event).await;
            should_notify(&event, &self.policy, None)
        };

        if !do_send {
            debug!(
                builder = %event.builder,
                build_id = event.build_id,
                result = event.result.map(|r| r.label()).unwrap_or(""),
                "Build finish not reported"
            );
            return DispatchReport::skipped(SkipReason::Filtered);
        }

        self.send(event).await
    }

    /// 补全源码版本；补全失败只记录日志
    async fn enrich(&self, event: &mut BuildEvent) {
        if let Err(e) = self.master.build_details(event).await {
            warn!(build_id = event.build_id, error = %e, "Failed to fetch build details");
        }
    }

    /// 渲染并投递
    async fn send(&self, mut event: BuildEvent) -> DispatchReport {
        if event.stage == BuildStage::Finished && !event.is_success() {
            match self.master.responsible_users(event.build_id).await {
                Ok(users) => event.responsible_users = users,
                Err(e) => warn!(
                    build_id = event.build_id,
                    error = %e,
                    "Failed to fetch responsible users"
                ),
            }
        }

        let message = self.formatter.render(&event, &self.policy);
        if message.is_empty() {
            debug!(build_id = event.build_id, "Rendered message is empty, nothing to send");
            return DispatchReport::skipped(SkipReason::EmptyMessage);
        }

        if self.policy.verbose {
            info!(payload = %message.to_json(), "Rendered build notification");
        } else {
            debug!(payload = %message.to_json(), "Rendered build notification");
        }

        if self.dry_run {
            info!(
                builder = %event.builder,
                build_id = event.build_id,
                revisions = event.sourcestamps.len(),
                "[DRY-RUN] Would post build notification"
            );
            return DispatchReport {
                skipped: Some(SkipReason::DryRun),
                message: Some(message),
                deliveries: Vec::new(),
            };
        }

        if event.sourcestamps.is_empty() {
            info!(build_id = event.build_id, "Build has no source stamps, nothing posted");
        }

        // 每个源码版本投递一次（payload 相同），互不影响
        let mut deliveries = Vec::new();
        for stamp in &event.sourcestamps {
            for endpoint in &self.policy.endpoints {
                let url = resolve_url(endpoint, stamp);
                deliveries.push(self.client.deliver(&message, &url, stamp).await);
            }
        }

        DispatchReport {
            skipped: None,
            message: Some(message),
            deliveries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;

    use crate::notification::event::BuildResult;
    use crate::notification::lineage::{InMemoryLineageStore, LineageStore};
    use crate::notification::master::StaticBuildMaster;
    use crate::notification::webhook::WebhookConfig;

    fn dispatcher(policy: NotificationPolicy) -> NotificationDispatcher {
        let client = WebhookClient::new(WebhookConfig::default()).unwrap();
        NotificationDispatcher::new(policy, client, Arc::new(StaticBuildMaster::new())).with_dry_run(true)
    }

    fn finished(result: BuildResult) -> BuildEvent {
        BuildEvent::finished("runtests", 1, "http://ci/builds/1", result)
            .with_sourcestamp("git://example/app", Some("abc123"))
    }

    #[tokio::test]
    async fn test_started_filtered_when_disabled() {
        let d = dispatcher(NotificationPolicy::default().report_on_start(false));
        let report = d.build_started(BuildEvent::started("runtests", 1, "http://ci/1")).await;
        assert_eq!(report.skipped, Some(SkipReason::Filtered));
        assert!(report.message.is_none());
    }

    #[tokio::test]
    async fn test_dry_run_renders_without_sending() {
        let d = dispatcher(NotificationPolicy::new("http://127.0.0.1:9/hook"));
        let report = d.build_finished(finished(BuildResult::Failure)).await;
        assert_eq!(report.skipped, Some(SkipReason::DryRun));
        assert!(report.deliveries.is_empty());
        assert_eq!(report.message.unwrap().attachment_count(), 1);
    }

    #[tokio::test]
    async fn test_fixed_build_not_reported_still_updates_lineage() {
        let d = dispatcher(
            NotificationPolicy::default()
                .report_only_failures(true)
                .report_fixed_builds(true),
        );

        let report = d.build_finished(finished(BuildResult::Success)).await;
        assert!(!report.notified());
        assert_eq!(d.lineage().last_result("runtests"), Some(BuildResult::Success));
    }

    #[tokio::test]
    async fn test_lineage_untouched_without_fixed_builds() {
        let store = Arc::new(InMemoryLineageStore::new());
        let d = dispatcher(NotificationPolicy::default().report_only_failures(true))
            .with_lineage(LineageTracker::new(store.clone()));

        d.build_finished(finished(BuildResult::Failure)).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_fix_after_failure_is_reported() {
        let store = Arc::new(InMemoryLineageStore::new());
        store.record("runtests", Some(BuildResult::Failure));
        let d = dispatcher(
            NotificationPolicy::default()
                .report_only_failures(true)
                .report_fixed_builds(true),
        )
        .with_lineage(LineageTracker::new(store.clone()));

        let report = d.build_finished(finished(BuildResult::Success)).await;
        assert!(report.notified());
        assert_eq!(store.last_result("runtests"), Some(BuildResult::Success));

        // 再次成功不算修复
        let report = d.build_finished(finished(BuildResult::Success)).await;
        assert_eq!(report.skipped, Some(SkipReason::Filtered));
    }

    #[tokio::test]
    async fn test_unknown_result_clears_failure_lineage() {
        let store = Arc::new(InMemoryLineageStore::new());
        let d = dispatcher(
            NotificationPolicy::default()
                .report_only_failures(true)
                .report_fixed_builds(true),
        )
        .with_lineage(LineageTracker::new(store.clone()));

        assert!(d.build_finished(finished(BuildResult::Failure)).await.notified());

        let mut unknown = finished(BuildResult::Success);
        unknown.result = None;
        d.build_finished(unknown).await;
        assert_eq!(store.last_result("runtests"), None);

        // 上一次没有结果，这次成功不算修复
        let report = d.build_finished(finished(BuildResult::Success)).await;
        assert_eq!(report.skipped, Some(SkipReason::Filtered));
        assert_eq!(store.last_result("runtests"), Some(BuildResult::Success));
    }

    /// build_details 对指定构建延迟返回的编排器
    struct SlowMaster {
        slow_build: i64,
    }

    #[async_trait]
    impl BuildMaster for SlowMaster {
        async fn build_details(&self, event: &mut BuildEvent) -> Result<()> {
            if event.build_id == self.slow_build {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Ok(())
        }

        async fn responsible_users(&self, _build_id: i64) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_slow_enrichment_keeps_builder_order() {
        let store = Arc::new(InMemoryLineageStore::new());
        let client = WebhookClient::new(WebhookConfig::default()).unwrap();
        let d = NotificationDispatcher::new(
            NotificationPolicy::default()
                .report_only_failures(true)
                .report_fixed_builds(true),
            client,
            Arc::new(SlowMaster { slow_build: 1 }),
        )
        .with_dry_run(true)
        .with_lineage(LineageTracker::new(store.clone()));

        let failed = BuildEvent::finished("runtests", 1, "http://ci/builds/1", BuildResult::Failure)
            .with_sourcestamp("git://example/app", Some("abc123"));
        let fixed = BuildEvent::finished("runtests", 2, "http://ci/builds/2", BuildResult::Success)
            .with_sourcestamp("git://example/app", Some("abc124"));

        let (first, second) = tokio::join!(d.build_finished(failed), d.build_finished(fixed));

        assert!(first.notified());
        assert!(second.notified());
        assert_eq!(store.last_result("runtests"), Some(BuildResult::Success));
    }

    #[tokio::test]
    async fn test_empty_message_is_not_sent() {
        let formatter = MessageFormatter::new().with_transform(|_, _| RenderedMessage::default());
        let d = dispatcher(NotificationPolicy::default()).with_formatter(formatter);
        let report = d.build_finished(finished(BuildResult::Failure)).await;
        assert_eq!(report.skipped, Some(SkipReason::EmptyMessage));
    }

    #[test]
    fn test_report_counters() {
        let report = DispatchReport {
            skipped: None,
            message: None,
            deliveries: vec![
                DeliveryOutcome {
                    url: "u".to_string(),
                    repository: "a".to_string(),
                    revision: None,
                    status: Some(200),
                    error: None,
                },
                DeliveryOutcome {
                    url: "u".to_string(),
                    repository: "b".to_string(),
                    revision: None,
                    status: Some(500),
                    error: Some("boom".to_string()),
                },
            ],
        };
        assert!(report.notified());
        assert_eq!(report.delivered(), 1);
    }
}

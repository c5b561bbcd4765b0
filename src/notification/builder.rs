//! 通知系统构建器 - 从配置组装分发器

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use super::config::ReporterConfig;
use super::dispatcher::NotificationDispatcher;
use super::formatter::MessageFormatter;
use super::lineage::{LineageStore, LineageTracker};
use super::master::BuildMaster;
use super::webhook::WebhookClient;

/// 通知系统构建器
pub struct NotificationBuilder {
    config_path: Option<PathBuf>,
    config: Option<ReporterConfig>,
    dry_run: bool,
    formatter: MessageFormatter,
    lineage_store: Option<Arc<dyn LineageStore>>,
}

impl NotificationBuilder {
    pub fn new() -> Self {
        Self {
            config_path: None,
            config: None,
            dry_run: false,
            formatter: MessageFormatter::new(),
            lineage_store: None,
        }
    }

    /// 指定配置文件路径
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// 直接使用已解析的配置（不再读取文件）
    pub fn config(mut self, config: ReporterConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 设置 dry-run 模式
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 设置格式化器（extra params 变换）
    pub fn formatter(mut self, formatter: MessageFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// 注入谱系存储
    pub fn lineage_store(mut self, store: Arc<dyn LineageStore>) -> Self {
        self.lineage_store = Some(store);
        self
    }

    /// 解析配置；警告会被记录但不会中断
    pub fn resolve_config(&self) -> Result<ReporterConfig> {
        if let Some(config) = &self.config {
            return Ok(config.clone());
        }
        let (config, warnings) = ReporterConfig::discover(self.config_path.as_deref())?;
        ReporterConfig::log_warnings(&warnings);
        Ok(config)
    }

    /// 构建 NotificationDispatcher
    pub fn build(self, master: Arc<dyn BuildMaster>) -> Result<NotificationDispatcher> {
        let config = self.resolve_config()?;
        let policy = config.policy();
        let client = WebhookClient::new(config.webhook()).context("Failed to create webhook client")?;

        let lineage = match self.lineage_store {
            Some(store) => LineageTracker::new(store),
            None => LineageTracker::in_memory(),
        };

        info!(
            endpoints = policy.endpoints.len(),
            report_on_start = policy.report_on_start,
            report_only_failures = policy.report_only_failures,
            report_fixed_builds = policy.report_fixed_builds,
            dry_run = self.dry_run,
            "Build notifier configured"
        );

        Ok(NotificationDispatcher::new(policy, client, master)
            .with_formatter(self.formatter)
            .with_lineage(lineage)
            .with_dry_run(self.dry_run))
    }
}

impl Default for NotificationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

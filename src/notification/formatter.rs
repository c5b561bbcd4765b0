//! 消息格式化模块 - 将构建事件渲染为 webhook 消息
//!
//! 主要功能：
//! - 标题行 `<url|Build #id> - *label*`
//! - 每个源码版本一个 attachment，颜色按结果区分
//! - 非成功构建附带责任人列表
//! - 按结果选择图标 emoji
//!
//! 渲染是纯函数：相同的事件和策略总是得到相同的消息。

use std::fmt;
use std::sync::Arc;

use super::event::{BuildEvent, BuildResult, BuildStage};
use super::payload::{Attachment, Block, RenderedMessage};
use super::policy::NotificationPolicy;

/// 消息模板常量
pub mod msg {
    pub const STARTED: &str = "Buildbot started build";
    pub const FINISHED: &str = "Buildbot finished build";
    pub const COMMITTERS: &str = "*Commiters:*";
    /// 未知/缺失结果时使用的图标
    pub const FALLBACK_EMOJI: &str = ":facepalm:";
}

/// 结果 -> attachment 颜色
pub fn result_color(result: BuildResult) -> &'static str {
    match result {
        BuildResult::Success => "#36a64f",
        BuildResult::Warnings => "#fc8c03",
        BuildResult::Failure => "#fc0303",
        BuildResult::Skipped => "#fc8c03",
        BuildResult::Exception => "#fc0303",
        BuildResult::Retry => "#fc8c03",
        BuildResult::Cancelled => "#fc8c03",
    }
}

/// 结果 -> 图标 emoji
pub fn result_emoji(result: BuildResult) -> &'static str {
    match result {
        BuildResult::Success => ":sunglassses:",
        BuildResult::Warnings => ":meow_wow:",
        BuildResult::Failure => ":skull:",
        BuildResult::Skipped => ":slam:",
        BuildResult::Exception => ":skull:",
        BuildResult::Retry => ":facepalm:",
        BuildResult::Cancelled => ":slam:",
    }
}

/// 渲染后的消息变换（extra params 扩展点）
///
/// 在渲染之后执行，可以注入或覆盖任意字段。
pub type MessageTransform = Arc<dyn Fn(RenderedMessage, &BuildEvent) -> RenderedMessage + Send + Sync>;

/// 消息格式化器
#[derive(Clone, Default)]
pub struct MessageFormatter {
    /// 可选的渲染后变换
    transform: Option<MessageTransform>,
}

impl fmt::Debug for MessageFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageFormatter")
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl MessageFormatter {
    /// 创建新的 MessageFormatter
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置渲染后变换
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(RenderedMessage, &BuildEvent) -> RenderedMessage + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// 渲染构建事件
    pub fn render(&self, event: &BuildEvent, policy: &NotificationPolicy) -> RenderedMessage {
        let mut message = match event.stage {
            BuildStage::Started => RenderedMessage::new(format!(
                "{} <{}|{}>",
                msg::STARTED,
                event.url,
                event.builder
            )),
            BuildStage::Finished => {
                let mut message =
                    RenderedMessage::new(format!("{} {}", msg::FINISHED, event.builder));
                if policy.attachments {
                    message.attachments = Some(Self::attachments(event));
                }
                message
            }
        };

        message.channel = policy.channel.clone();
        message.username = policy.username.clone();
        message.icon_emoji = Some(
            event
                .result
                .map(result_emoji)
                .unwrap_or(msg::FALLBACK_EMOJI)
                .to_string(),
        );

        match &self.transform {
            Some(transform) => transform(message, event),
            None => message,
        }
    }

    /// 标题行：`<url|Build #id> - *label*`
    pub fn title(event: &BuildEvent) -> String {
        format!(
            "<{}|Build #{}> - *{}*",
            event.url,
            event.build_id,
            event.result.map(|r| r.label()).unwrap_or("")
        )
    }

    /// 每个源码版本一个 attachment（内容相同）
    fn attachments(event: &BuildEvent) -> Vec<Attachment> {
        let color = event.result.map(result_color).unwrap_or("");
        let title = Self::title(event);
        let committers = Self::committers_block(event);

        event
            .sourcestamps
            .iter()
            .map(|_| {
                let mut blocks = vec![Block::markdown(title.clone())];
                if let Some(block) = &committers {
                    blocks.push(block.clone());
                }
                Attachment {
                    color: color.to_string(),
                    blocks,
                }
            })
            .collect()
    }

    /// 非成功构建的责任人块；列表为空时不生成
    fn committers_block(event: &BuildEvent) -> Option<Block> {
        if event.is_success() || event.responsible_users.is_empty() {
            return None;
        }
        Some(Block::markdown(format!(
            "{}\n{}",
            msg::COMMITTERS,
            event.responsible_users.join(", ")
        )))
    }
}

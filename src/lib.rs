//! build-notify - 构建事件聊天通知
//!
//! 接收编排器的构建开始/结束事件，按策略过滤，渲染为 Slack 兼容的
//! 消息，并投递到 webhook。

pub mod cli;
pub mod notification;

pub use notification::{
    BuildEvent, BuildMaster, BuildResult, BuildStage, DispatchReport, NotificationBuilder,
    NotificationDispatcher, NotificationPolicy, RenderedMessage, ReporterConfig, SourceStamp,
    StaticBuildMaster,
};

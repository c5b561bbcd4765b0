//! 构建通知 - 把构建开始/结束事件推送到聊天 webhook
//!
//! # 流程
//! 1. 过滤：`filter::should_notify` 根据策略决定是否通知
//! 2. 谱系：开启 fixed-build 通知时记录每个 builder 的上次结果
//! 3. 渲染：`MessageFormatter` 生成 Slack 兼容的 payload
//! 4. 投递：`WebhookClient` 为每个源码版本 POST 一次，失败只记日志
//!
//! # 使用示例
//! ```ignore
//! use build_notify::notification::{BuildEvent, BuildResult, NotificationBuilder, StaticBuildMaster};
//!
//! let dispatcher = NotificationBuilder::new()
//!     .config_path("config.json")
//!     .build(Arc::new(StaticBuildMaster::new()))?;
//!
//! let event = BuildEvent::finished("runtests", 42, "http://ci/builds/42", BuildResult::Failure);
//! dispatcher.build_finished(event).await;
//! ```

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod event;
pub mod filter;
pub mod formatter;
pub mod lineage;
pub mod master;
pub mod payload;
pub mod policy;
pub mod webhook;

pub use builder::NotificationBuilder;
pub use config::{ConfigWarning, ReporterConfig};
pub use dispatcher::{DispatchReport, NotificationDispatcher, SkipReason};
pub use event::{BuildEvent, BuildResult, BuildStage, SourceStamp};
pub use filter::should_notify;
pub use formatter::{MessageFormatter, MessageTransform};
pub use lineage::{InMemoryLineageStore, LineageStore, LineageTracker};
pub use master::{BuildMaster, StaticBuildMaster};
pub use payload::{Attachment, Block, RenderedMessage};
pub use policy::NotificationPolicy;
pub use webhook::{DeliveryError, DeliveryOutcome, WebhookClient, WebhookConfig};

//! 事件过滤 - 决定一个构建事件是否值得通知

use super::event::{BuildEvent, BuildResult, BuildStage};
use super::policy::NotificationPolicy;

/// 判断是否发送通知
///
/// `previous` 必须是本次事件写入之前读到的上次结果。
pub fn should_notify(
    event: &BuildEvent,
    policy: &NotificationPolicy,
    previous: Option<BuildResult>,
) -> bool {
    match event.stage {
        BuildStage::Started => policy.report_on_start,
        BuildStage::Finished => {
            if !policy.report_only_failures {
                return true;
            }
            if event.is_failure() {
                return true;
            }
            policy.report_fixed_builds
                && event.is_success()
                && previous.map(|r| r.is_failure()).unwrap_or(false)
        }
    }
}

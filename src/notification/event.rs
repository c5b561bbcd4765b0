//! 构建事件结构
//!
//! 编排器在构建开始/结束时推送的快照。`BuildResult` 是封闭枚举，
//! 既接受编排器的数字结果码（0..=6），也接受小写标签；无法识别的值
//! 统一降级为"无结果"，不会导致反序列化失败。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 构建生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    /// 构建开始
    Started,
    /// 构建结束
    Finished,
}

impl BuildStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStage::Started => "started",
            BuildStage::Finished => "finished",
        }
    }
}

/// 构建终态结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildResult {
    Success,
    Warnings,
    Failure,
    Skipped,
    Exception,
    Retry,
    Cancelled,
}

impl BuildResult {
    /// 从编排器的数字结果码转换
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(BuildResult::Success),
            1 => Some(BuildResult::Warnings),
            2 => Some(BuildResult::Failure),
            3 => Some(BuildResult::Skipped),
            4 => Some(BuildResult::Exception),
            5 => Some(BuildResult::Retry),
            6 => Some(BuildResult::Cancelled),
            _ => None,
        }
    }

    /// 从标签转换（大小写不敏感）
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "success" => Some(BuildResult::Success),
            "warnings" => Some(BuildResult::Warnings),
            "failure" => Some(BuildResult::Failure),
            "skipped" => Some(BuildResult::Skipped),
            "exception" => Some(BuildResult::Exception),
            "retry" => Some(BuildResult::Retry),
            "cancelled" => Some(BuildResult::Cancelled),
            _ => None,
        }
    }

    /// 人类可读的结果标签
    pub fn label(&self) -> &'static str {
        match self {
            BuildResult::Success => "success",
            BuildResult::Warnings => "warnings",
            BuildResult::Failure => "failure",
            BuildResult::Skipped => "skipped",
            BuildResult::Exception => "exception",
            BuildResult::Retry => "retry",
            BuildResult::Cancelled => "cancelled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildResult::Success)
    }

    /// FAILURE 和 EXCEPTION 都算失败
    pub fn is_failure(&self) -> bool {
        matches!(self, BuildResult::Failure | BuildResult::Exception)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().and_then(Self::from_code),
            Value::String(s) => Self::from_label(s),
            _ => None,
        }
    }
}

impl std::str::FromStr for BuildResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.trim().parse::<i64>() {
            return Self::from_code(code).ok_or_else(|| format!("unknown result code: {}", code));
        }
        Self::from_label(s).ok_or_else(|| format!("unknown result: {}", s))
    }
}

/// 宽松反序列化：未知结果 -> None
fn deserialize_result<'de, D>(deserializer: D) -> Result<Option<BuildResult>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(BuildResult::from_value))
}

/// 单个源码版本（仓库 + 提交）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStamp {
    /// 仓库标识
    #[serde(default)]
    pub repository: String,
    /// 提交版本，可能缺失
    #[serde(default)]
    pub revision: Option<String>,
}

impl SourceStamp {
    pub fn new(repository: impl Into<String>, revision: Option<&str>) -> Self {
        Self {
            repository: repository.into(),
            revision: revision.map(|r| r.to_string()),
        }
    }
}

/// 构建事件快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildEvent {
    /// 生命周期阶段
    pub stage: BuildStage,
    /// Builder 名称（同一条流水线稳定不变）
    pub builder: String,
    /// 构建 ID
    pub build_id: i64,
    /// 构建结果（STARTED 时为空）
    #[serde(default, deserialize_with = "deserialize_result")]
    pub result: Option<BuildResult>,
    /// 构建页面 URL
    #[serde(default)]
    pub url: String,
    /// 源码版本列表（有序）
    #[serde(default)]
    pub sourcestamps: Vec<SourceStamp>,
    /// 责任人显示名（仅非成功结果时才会被填充）
    #[serde(default)]
    pub responsible_users: Vec<String>,
}

impl BuildEvent {
    /// 创建 STARTED 事件
    pub fn started(builder: impl Into<String>, build_id: i64, url: impl Into<String>) -> Self {
        Self {
            stage: BuildStage::Started,
            builder: builder.into(),
            build_id,
            result: None,
            url: url.into(),
            sourcestamps: Vec::new(),
            responsible_users: Vec::new(),
        }
    }

    /// 创建 FINISHED 事件
    pub fn finished(
        builder: impl Into<String>,
        build_id: i64,
        url: impl Into<String>,
        result: BuildResult,
    ) -> Self {
        Self {
            stage: BuildStage::Finished,
            result: Some(result),
            ..Self::started(builder, build_id, url)
        }
    }

    /// 追加源码版本
    pub fn with_sourcestamp(mut self, repository: impl Into<String>, revision: Option<&str>) -> Self {
        self.sourcestamps.push(SourceStamp::new(repository, revision));
        self
    }

    /// 设置责任人
    pub fn with_responsible_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responsible_users = users.into_iter().map(Into::into).collect();
        self
    }

    /// 结果是否为 SUCCESS
    pub fn is_success(&self) -> bool {
        self.result.map(|r| r.is_success()).unwrap_or(false)
    }

    /// 结果是否为 FAILURE / EXCEPTION
    pub fn is_failure(&self) -> bool {
        self.result.map(|r| r.is_failure()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_from_numeric_code() {
        let json = r#"{"stage":"finished","builder":"runtests","build_id":7,"result":2}"#;
        let event: BuildEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.result, Some(BuildResult::Failure));
        assert!(event.is_failure());
    }

    #[test]
    fn test_result_from_label() {
        let json = r#"{"stage":"finished","builder":"runtests","build_id":7,"result":"Exception"}"#;
        let event: BuildEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.result, Some(BuildResult::Exception));
    }

    #[test]
    fn test_unknown_result_degrades_to_none() {
        for raw in ["42", r#""exploded""#, "true", "null"] {
            let json = format!(
                r#"{{"stage":"finished","builder":"b","build_id":1,"result":{}}}"#,
                raw
            );
            let event: BuildEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(event.result, None, "raw result {}", raw);
            assert!(!event.is_success());
            assert!(!event.is_failure());
        }
    }

    #[test]
    fn test_started_event_defaults() {
        let json = r#"{"stage":"started","builder":"runtests","build_id":3}"#;
        let event: BuildEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.stage, BuildStage::Started);
        assert!(event.result.is_none());
        assert!(event.sourcestamps.is_empty());
        assert!(event.responsible_users.is_empty());
    }

    #[test]
    fn test_sourcestamp_missing_revision() {
        let json = r#"{"stage":"finished","builder":"b","build_id":1,"result":0,
            "sourcestamps":[{"repository":"git://a"},{"repository":"git://b","revision":"abc123"}]}"#;
        let event: BuildEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.sourcestamps.len(), 2);
        assert_eq!(event.sourcestamps[0].revision, None);
        assert_eq!(event.sourcestamps[1].revision.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_result_from_str() {
        assert_eq!("failure".parse::<BuildResult>(), Ok(BuildResult::Failure));
        assert_eq!("0".parse::<BuildResult>(), Ok(BuildResult::Success));
        assert!("nope".parse::<BuildResult>().is_err());
    }

    #[test]
    fn test_failure_classification() {
        assert!(BuildResult::Failure.is_failure());
        assert!(BuildResult::Exception.is_failure());
        assert!(!BuildResult::Warnings.is_failure());
        assert!(!BuildResult::Cancelled.is_failure());
        assert!(BuildResult::Success.is_success());
    }
}

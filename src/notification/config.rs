//! Reporter 配置加载与校验
//!
//! 配置来源（按优先级）：
//! 1. `--config` 指定的文件
//! 2. `~/.config/build-notify/config.json`
//! 3. 环境变量 `BUILD_NOTIFY_ENDPOINT`（只提供 endpoint，其余取默认值）
//!
//! 配置错误只产生警告，从不阻止启动：类型不对的字段回退到默认值。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::policy::NotificationPolicy;
use super::webhook::WebhookConfig;

/// 环境变量：webhook endpoint
pub const ENDPOINT_ENV: &str = "BUILD_NOTIFY_ENDPOINT";

/// 配置警告
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigWarning {
    #[error("endpoint should be a string, got '{0}' instead")]
    EndpointNotString(&'static str),
    #[error("endpoint should start with \"http...\", endpoint: {0}")]
    EndpointScheme(String),
    #[error("endpoint is not configured")]
    EndpointMissing,
    #[error("{field} must be a string, got '{found}' instead")]
    NotString { field: &'static str, found: &'static str },
    #[error("{field} must be a boolean, got '{found}' instead")]
    NotBool { field: &'static str, found: &'static str },
    #[error("{field} must be a positive integer, got '{found}' instead")]
    NotInteger { field: &'static str, found: &'static str },
    #[error("argument host_url is deprecated and will be removed in the next release: specify the full url as endpoint")]
    HostUrlDeprecated,
}

/// Reporter 配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterConfig {
    /// webhook endpoint（可能无效，已经产生过警告）
    pub endpoint: String,
    /// 额外的 endpoint
    pub additional_endpoints: Vec<String>,
    pub channel: Option<String>,
    pub username: Option<String>,
    /// 已废弃：endpoint 前缀
    pub host_url: Option<String>,
    pub attachments: bool,
    /// 校验 TLS 证书
    pub verify: bool,
    pub verbose: bool,
    pub timeout_secs: u64,
    pub report_build_started: bool,
    pub report_only_failures: bool,
    pub report_fixed_build: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            additional_endpoints: Vec::new(),
            channel: None,
            username: None,
            host_url: None,
            attachments: true,
            verify: true,
            verbose: false,
            timeout_secs: 30,
            report_build_started: true,
            report_only_failures: false,
            report_fixed_build: false,
        }
    }
}

/// JSON 值的类型名（用于警告信息）
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ReporterConfig {
    /// 默认配置文件路径
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("build-notify")
            .join("config.json")
    }

    /// 从 JSON 值解析，返回配置和所有警告
    pub fn from_value(raw: &Value) -> (Self, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();
        let mut config = Self::default();

        match raw.get("endpoint") {
            Some(Value::String(endpoint)) => {
                if !endpoint.starts_with("http") {
                    warnings.push(ConfigWarning::EndpointScheme(endpoint.clone()));
                }
                config.endpoint = endpoint.clone();
            }
            Some(other) => warnings.push(ConfigWarning::EndpointNotString(type_name(other))),
            None => warnings.push(ConfigWarning::EndpointMissing),
        }

        config.channel = Self::optional_string(raw, "channel", &mut warnings);
        config.username = Self::optional_string(raw, "username", &mut warnings);
        config.host_url = Self::optional_string(raw, "host_url", &mut warnings)
            .map(|url| url.trim_end_matches('/').to_string());
        if config.host_url.is_some() {
            warnings.push(ConfigWarning::HostUrlDeprecated);
        }

        match raw.get("additional_endpoints") {
            Some(Value::Array(items)) => {
                for item in items {
                    match item {
                        Value::String(url) => {
                            if !url.starts_with("http") {
                                warnings.push(ConfigWarning::EndpointScheme(url.clone()));
                            }
                            config.additional_endpoints.push(url.clone());
                        }
                        other => warnings.push(ConfigWarning::NotString {
                            field: "additional_endpoints",
                            found: type_name(other),
                        }),
                    }
                }
            }
            Some(Value::Null) | None => {}
            Some(other) => warnings.push(ConfigWarning::NotString {
                field: "additional_endpoints",
                found: type_name(other),
            }),
        }

        config.attachments = Self::bool_or(raw, "attachments", config.attachments, &mut warnings);
        config.verify = Self::bool_or(raw, "verify", config.verify, &mut warnings);
        config.verbose = Self::bool_or(raw, "verbose", config.verbose, &mut warnings);
        config.report_build_started =
            Self::bool_or(raw, "report_build_started", config.report_build_started, &mut warnings);
        config.report_only_failures =
            Self::bool_or(raw, "report_only_failures", config.report_only_failures, &mut warnings);
        config.report_fixed_build =
            Self::bool_or(raw, "report_fixed_build", config.report_fixed_build, &mut warnings);

        match raw.get("timeout_secs") {
            Some(Value::Null) | None => {}
            Some(value) => match value.as_u64().filter(|t| *t > 0) {
                Some(timeout) => config.timeout_secs = timeout,
                None => warnings.push(ConfigWarning::NotInteger {
                    field: "timeout_secs",
                    found: type_name(value),
                }),
            },
        }

        (config, warnings)
    }

    /// 从文件加载；文件不存在或 JSON 损坏时返回错误
    pub fn load(path: &Path) -> Result<(Self, Vec<ConfigWarning>)> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let raw: Value = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in config file {}", path.display()))?;
        debug!(path = %path.display(), "Loaded reporter config");
        Ok(Self::from_value(&raw))
    }

    /// 按优先级查找配置：显式路径 → 默认路径 → 环境变量
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Vec<ConfigWarning>)> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let default_path = Self::default_path();
        if default_path.exists() {
            return Self::load(&default_path);
        }

        let raw = match std::env::var(ENDPOINT_ENV) {
            Ok(endpoint) => serde_json::json!({ "endpoint": endpoint }),
            Err(_) => serde_json::json!({}),
        };
        Ok(Self::from_value(&raw))
    }

    /// 记录所有警告（不中断）
    pub fn log_warnings(warnings: &[ConfigWarning]) {
        for warning in warnings {
            warn!(warning = %warning, "Reporter misconfigured");
        }
    }

    /// 实际投递用的 URL 列表
    ///
    /// 设置了（已废弃的）host_url 时，endpoint 被视为相对路径拼接在其后。
    pub fn endpoints(&self) -> Vec<String> {
        let primary = match &self.host_url {
            Some(host) if !self.endpoint.starts_with("http") => {
                format!("{}/{}", host, self.endpoint.trim_start_matches('/'))
            }
            _ => self.endpoint.clone(),
        };

        std::iter::once(primary)
            .filter(|url| !url.is_empty())
            .chain(self.additional_endpoints.iter().cloned())
            .collect()
    }

    /// 转换为通知策略
    pub fn policy(&self) -> NotificationPolicy {
        NotificationPolicy {
            report_on_start: self.report_build_started,
            report_only_failures: self.report_only_failures,
            report_fixed_builds: self.report_fixed_build,
            channel: self.channel.clone(),
            endpoints: self.endpoints(),
            username: self.username.clone(),
            attachments: self.attachments,
            verbose: self.verbose,
        }
    }

    /// 转换为 HTTP 客户端配置
    pub fn webhook(&self) -> WebhookConfig {
        WebhookConfig {
            timeout_secs: self.timeout_secs,
            verify_tls: self.verify,
        }
    }

    fn optional_string(
        raw: &Value,
        field: &'static str,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Option<String> {
        match raw.get(field) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::String(_)) | Some(Value::Null) | None => None,
            Some(other) => {
                warnings.push(ConfigWarning::NotString {
                    field,
                    found: type_name(other),
                });
                None
            }
        }
    }

    fn bool_or(
        raw: &Value,
        field: &'static str,
        default: bool,
        warnings: &mut Vec<ConfigWarning>,
    ) -> bool {
        match raw.get(field) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Null) | None => default,
            Some(other) => {
                warnings.push(ConfigWarning::NotBool {
                    field,
                    found: type_name(other),
                });
                default
            }
        }
    }
}

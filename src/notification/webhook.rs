//! Webhook 投递客户端
//!
//! 每次 POST 一个 JSON payload。只有 HTTP 200 算成功；其他状态码和
//! 传输错误都只记录日志，不重试、不向上抛。

use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, error, info};

use super::event::SourceStamp;
use super::payload::RenderedMessage;

/// 投递失败原因
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// 非 200 响应
    #[error("{status}: unable to upload status: {body}")]
    Status { status: u16, body: String },
    /// 连接/超时/TLS 等传输层错误
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// HTTP 客户端构建失败
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

/// Webhook 客户端配置
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// 超时时间 (秒)
    pub timeout_secs: u64,
    /// 是否校验 TLS 证书
    pub verify_tls: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            verify_tls: true,
        }
    }
}

/// 单次投递结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// 实际请求的 URL
    pub url: String,
    pub repository: String,
    pub revision: Option<String>,
    /// HTTP 状态码（传输失败时为 None）
    pub status: Option<u16>,
    /// 失败描述
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        self.status == Some(StatusCode::OK.as_u16())
    }
}

/// 替换 URL 中的 `{revision}` / `{repository}` 占位符
pub fn resolve_url(template: &str, stamp: &SourceStamp) -> String {
    template
        .replace("{revision}", stamp.revision.as_deref().unwrap_or(""))
        .replace("{repository}", &stamp.repository)
}

/// Webhook 投递客户端
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: Client,
}

impl WebhookClient {
    /// 创建新的 Webhook 客户端
    pub fn new(config: WebhookConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| DeliveryError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    /// POST 一次 payload，200 以外都算失败
    pub async fn post(&self, url: &str, message: &RenderedMessage) -> Result<(), DeliveryError> {
        let response = self.client.post(url).json(message).send().await?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// 为某个源码版本投递一次，失败只记日志
    pub async fn deliver(
        &self,
        message: &RenderedMessage,
        url: &str,
        stamp: &SourceStamp,
    ) -> DeliveryOutcome {
        if stamp.revision.is_none() {
            debug!(repository = %stamp.repository, "No specific revision for this source stamp");
        }

        info!(url = %url, "Posting build notification");

        let mut outcome = DeliveryOutcome {
            url: url.to_string(),
            repository: stamp.repository.clone(),
            revision: stamp.revision.clone(),
            status: None,
            error: None,
        };

        match self.post(url, message).await {
            Ok(()) => {
                outcome.status = Some(StatusCode::OK.as_u16());
            }
            Err(e) => {
                if let DeliveryError::Status { status, .. } = &e {
                    outcome.status = Some(*status);
                    error!(url = %url, error = %e, "Webhook rejected build notification");
                } else {
                    error!(
                        repository = %stamp.repository,
                        revision = stamp.revision.as_deref().unwrap_or("None"),
                        error = %e,
                        "Failed to send build notification"
                    );
                }
                outcome.error = Some(e.to_string());
            }
        }

        outcome
    }
}

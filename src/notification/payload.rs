//! Payload 结构 - 发往 webhook 的 JSON 消息
//!
//! Payload 格式（Slack incoming webhook 兼容）：
//! ```json
//! {
//!   "text": "Buildbot finished build runtests",
//!   "channel": "#ci",
//!   "icon_emoji": ":skull:",
//!   "attachments": [
//!     {
//!       "color": "#fc0303",
//!       "blocks": [
//!         { "type": "section", "text": { "type": "mrkdwn", "text": "<url|Build #42> - *failure*" } }
//!       ]
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 渲染完成、可直接发送的消息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedMessage {
    /// 消息正文
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// 覆盖频道
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// 显示用户名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// 图标 emoji
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    /// 附件（每个源码版本一个）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    /// 额外字段（由 MessageTransform 注入，平铺到顶层）
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RenderedMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// 追加/覆盖额外字段
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// 合并额外参数，已知字段覆盖对应的结构化字段，其余平铺到 extra
    ///
    /// 已知字段类型不对时，清空结构化字段并把原值放进 extra，
    /// 保证序列化后每个 key 只出现一次。
    pub fn merge_params(&mut self, params: Map<String, Value>) {
        for (key, value) in params {
            let consumed = match (key.as_str(), &value) {
                ("text", Value::String(text)) => {
                    self.text = text.clone();
                    true
                }
                ("channel", _) => Self::merge_optional(&mut self.channel, &value),
                ("username", _) => Self::merge_optional(&mut self.username, &value),
                ("icon_emoji", _) => Self::merge_optional(&mut self.icon_emoji, &value),
                ("attachments", Value::Null) => {
                    self.attachments = None;
                    true
                }
                ("attachments", _) => match serde_json::from_value(value.clone()) {
                    Ok(attachments) => {
                        self.attachments = Some(attachments);
                        true
                    }
                    Err(_) => {
                        self.attachments = None;
                        false
                    }
                },
                ("text", _) => {
                    self.text.clear();
                    false
                }
                _ => false,
            };
            if !consumed {
                self.extra.insert(key, value);
            }
        }
    }

    fn merge_optional(field: &mut Option<String>, value: &Value) -> bool {
        match value {
            Value::String(s) => {
                *field = Some(s.clone());
                true
            }
            Value::Null => {
                *field = None;
                true
            }
            _ => {
                *field = None;
                false
            }
        }
    }

    /// 没有任何可发送的内容
    ///
    /// icon/channel/username 只是修饰，不算内容。
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
            && self.attachments.as_ref().map(|a| a.is_empty()).unwrap_or(true)
            && self.extra.is_empty()
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments.as_ref().map(|a| a.len()).unwrap_or(0)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// 附件块
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// 颜色（如 "#fc0303"），未知结果为空串
    pub color: String,
    pub blocks: Vec<Block>,
}

/// 内容块
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { text: TextObject },
}

impl Block {
    /// mrkdwn 格式的 section 块
    pub fn markdown(text: impl Into<String>) -> Self {
        Block::Section {
            text: TextObject::Mrkdwn { text: text.into() },
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Block::Section {
                text: TextObject::Mrkdwn { text },
            } => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Mrkdwn { text: String },
}

//! 对话消息与结构化动作请求
//!
//! 历史只追加不覆盖；工具回复通过 reply_to 关联到它所回答的动作请求。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 消息角色（Tool 为动作请求的回复，含合成回复）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// Agent 回复中携带的结构化动作请求：工具调用或交接信号
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl ActionRequest {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            args,
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_requests: Vec<ActionRequest>,
    /// 所回答的动作请求 id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            action_requests: Vec::new(),
            reply_to: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// 带一个动作请求的 assistant 消息
    pub fn assistant_with_action(content: impl Into<String>, action: ActionRequest) -> Self {
        Self {
            action_requests: vec![action],
            ..Self::plain(Role::Assistant, content)
        }
    }

    /// 回答某个动作请求的消息（工具结果、交接说明、拒绝说明等）
    pub fn reply(reply_to: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            reply_to: Some(reply_to.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    /// 路由只看第一个动作请求
    pub fn first_action(&self) -> Option<&ActionRequest> {
        self.action_requests.first()
    }

    pub fn has_actions(&self) -> bool {
        !self.action_requests.is_empty()
    }
}

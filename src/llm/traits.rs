//! LLM 客户端抽象
//!
//! 每个 Agent 节点调用一次 complete：传入渲染好的 system prompt、完整对话历史与可发出的动作清单，
//! 返回一条 assistant 消息（零个或多个动作请求）。

use async_trait::async_trait;

use crate::dialog::Message;
use crate::registry::ActionSpec;

/// 单次补全请求
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub messages: &'a [Message],
    pub actions: &'a [ActionSpec],
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Message, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

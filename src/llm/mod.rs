//! LLM 层：客户端抽象与实现（OpenAI 兼容 / 关键词 Mock / 脚本化 Mock）

pub mod mock;
pub mod openai;
pub mod parse;
pub mod traits;

use std::sync::Arc;

pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use parse::parse_action_request;
pub use traits::{CompletionRequest, LlmClient};

use crate::config::{AppConfig, LlmProvider};

/// 按配置创建客户端
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    match cfg.llm.provider {
        LlmProvider::OpenAi => {
            tracing::info!(model = %cfg.llm.model, "using OpenAI-compatible LLM");
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                cfg.llm.api_key.as_deref(),
            ))
        }
        LlmProvider::Mock => {
            tracing::info!("using keyword mock LLM");
            Arc::new(MockLlmClient)
        }
    }
}

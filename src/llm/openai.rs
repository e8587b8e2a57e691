//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）。动作清单与输出格式写进 system prompt，
//! 模型以 JSON 文本发出动作请求，由 parse_action_request 解析；工具回复以 Observation 形式作为 user 消息回填。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::dialog::{Message, Role};
use crate::llm::{parse_action_request, CompletionRequest, LlmClient};
use crate::registry::ActionSpec;
use crate::tools::action_call_schema_json;

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            usage: TokenUsage::new(),
        }
    }

    fn to_openai_messages(
        &self,
        request: &CompletionRequest<'_>,
    ) -> Result<Vec<ChatCompletionRequestMessage>, String> {
        let mut out = Vec::with_capacity(request.messages.len() + 1);
        out.push(system_message(render_system(request.system, request.actions))?);
        for m in request.messages {
            let converted = match m.role {
                Role::System => system_message(m.content.clone())?,
                Role::User => user_message(m.content.clone())?,
                Role::Tool => user_message(format!(
                    "Observation for {}: {}",
                    m.reply_to.as_deref().unwrap_or("?"),
                    m.content
                ))?,
                Role::Assistant => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(render_assistant(m))
                        .build()
                        .map_err(|e| e.to_string())?,
                ),
            };
            out.push(converted);
        }
        Ok(out)
    }
}

fn system_message(content: String) -> Result<ChatCompletionRequestMessage, String> {
    Ok(ChatCompletionRequestMessage::System(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()
            .map_err(|e| e.to_string())?,
    ))
}

fn user_message(content: String) -> Result<ChatCompletionRequestMessage, String> {
    Ok(ChatCompletionRequestMessage::User(
        ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()
            .map_err(|e| e.to_string())?,
    ))
}

/// assistant 历史消息：文字后附上它发出的动作请求（同样的 JSON 格式，便于模型模仿）
fn render_assistant(m: &Message) -> String {
    let mut text = m.content.clone();
    for action in &m.action_requests {
        let call = serde_json::json!({"action": action.name, "args": action.args});
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&call.to_string());
    }
    text
}

/// system prompt 末尾追加可用动作与输出格式说明
fn render_system(system: &str, actions: &[ActionSpec]) -> String {
    let mut out = String::from(system);
    out.push_str("\n\n## Available actions\n");
    for action in actions {
        out.push_str(&format!(
            "- {}: {}\n  parameters: {}\n",
            action.name, action.description, action.parameters
        ));
    }
    out.push_str(
        "\nTo take an action, reply with a single JSON object matching this schema and nothing else:\n",
    );
    out.push_str(&action_call_schema_json());
    out.push_str("\nOtherwise reply to the user in plain text. Emit at most one action per reply.");
    out
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Message, String> {
        let chat = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(self.to_openai_messages(&request)?)
            .build()
            .map_err(|e| e.to_string())?;

        let response = self
            .client
            .chat()
            .create(chat)
            .await
            .map_err(|e| e.to_string())?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(parse_action_request(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::ActionRequest;
    use serde_json::json;

    #[test]
    fn test_render_system_lists_actions() {
        let actions = vec![ActionSpec::complete_or_escalate()];
        let s = render_system("You are helpful.", &actions);
        assert!(s.starts_with("You are helpful."));
        assert!(s.contains("- CompleteOrEscalate:"));
        assert!(s.contains("at most one action"));
    }

    #[test]
    fn test_render_assistant_appends_action_json() {
        let msg = Message::assistant_with_action(
            "Checking.",
            ActionRequest::new("get_order_status", json!({"order_id": "42"})),
        );
        let text = render_assistant(&msg);
        assert!(text.starts_with("Checking.\n"));
        assert!(text.contains(r#""action":"get_order_status""#));
    }

    #[test]
    fn test_message_conversion_keeps_order() {
        let client = OpenAiClient::new(Some("http://localhost:1"), "test-model", Some("sk-test"));
        let call = ActionRequest::new("faq_lookup", json!({"query": "refund"}));
        let messages = vec![
            Message::user("refund?"),
            Message::assistant_with_action("", call.clone()),
            Message::reply(call.id, "Refunds take 5 days"),
        ];
        let req = CompletionRequest { system: "sys", messages: &messages, actions: &[] };
        let converted = client.to_openai_messages(&req).unwrap();
        assert_eq!(converted.len(), 4);
        assert!(matches!(converted[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(converted[3], ChatCompletionRequestMessage::User(_)));
    }
}

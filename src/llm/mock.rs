//! Mock LLM 客户端（用于本地演示与测试，无需 API）
//!
//! - `MockLlmClient`：按关键词把最后一条用户输入匹配到可用动作；工具回复到达后直接复述结果。
//! - `ScriptedLlmClient`：按顺序返回预设回复，并记录每次请求，便于断言。

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::dialog::{ActionRequest, Message, Role};
use crate::llm::{CompletionRequest, LlmClient};
use crate::registry::{ActionSpec, COMPLETE_OR_ESCALATE};

#[derive(Debug, Default)]
pub struct MockLlmClient;

fn words(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 3)
        .collect()
}

/// 动作名拆词：snake_case 与 CamelCase 都拆开
fn name_words(name: &str) -> HashSet<String> {
    let mut spaced = String::new();
    for c in name.chars() {
        if c.is_uppercase() {
            spaced.push(' ');
        }
        spaced.push(c);
    }
    words(&spaced.replace('_', " "))
}

fn first_number(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// 依据参数 schema 的字段名填参数
fn fill_args(spec: &ActionSpec, text: &str) -> Value {
    let mut args = serde_json::Map::new();
    if let Some(props) = spec.parameters.get("properties").and_then(Value::as_object) {
        for key in props.keys() {
            let value = match key.as_str() {
                "order_id" => first_number(text).unwrap_or_default(),
                "status" => "completed".to_string(),
                _ => text.to_string(),
            };
            args.insert(key.clone(), Value::String(value));
        }
    }
    Value::Object(args)
}

/// 最后一条用户消息之后，是否已有本 Agent 工具的回复
fn latest_tool_result<'a>(request: &CompletionRequest<'a>) -> Option<&'a Message> {
    let messages = request.messages;
    let since = messages.iter().rposition(|m| m.role == Role::User).unwrap_or(0);
    let tail = &messages[since..];
    let reply = tail.iter().rev().find(|m| m.role == Role::Tool)?;
    let reply_to = reply.reply_to.as_deref()?;
    let action = tail
        .iter()
        .flat_map(|m| m.action_requests.iter())
        .find(|a| a.id == reply_to)?;
    request
        .actions
        .iter()
        .any(|spec| spec.name == action.name && spec.name != COMPLETE_OR_ESCALATE)
        .then_some(reply)
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Message, String> {
        if let Some(result) = latest_tool_result(&request) {
            return Ok(Message::assistant(result.content.clone()));
        }
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        let query = words(last_user);

        let best = request
            .actions
            .iter()
            .filter(|spec| spec.name != COMPLETE_OR_ESCALATE)
            .map(|spec| {
                let mut vocab = name_words(&spec.name);
                vocab.extend(words(&spec.description));
                (vocab.intersection(&query).count(), spec)
            })
            .filter(|(score, _)| *score > 0)
            .max_by_key(|(score, _)| *score);

        Ok(match best {
            Some((_, spec)) => Message::assistant_with_action(
                "",
                ActionRequest::new(spec.name.clone(), fill_args(spec, last_user)),
            ),
            None => Message::assistant(format!("Mock reply: {last_user}")),
        })
    }
}

/// 一次被记录的请求
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub actions: Vec<String>,
    pub message_count: usize,
}

/// 脚本化客户端：依次弹出预设回复；脚本耗尽时返回错误
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Message>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedLlmClient {
    pub fn new(script: impl IntoIterator<Item = Message>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 便捷构造：发出一个动作请求
    pub fn action(name: &str, args: Value) -> Message {
        Message::assistant_with_action("", ActionRequest::new(name, args))
    }

    pub fn complete_or_escalate(status: &str) -> Message {
        Self::action(COMPLETE_OR_ESCALATE, json!({"status": status, "detail": ""}))
    }

    pub fn push(&self, message: Message) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(message);
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Message, String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                system: request.system.to_string(),
                actions: request.actions.iter().map(|a| a.name.clone()).collect(),
                message_count: request.messages.len(),
            });
        }
        self.script
            .lock()
            .map_err(|_| "script lock poisoned".to_string())?
            .pop_front()
            .ok_or_else(|| "script exhausted".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_actions() -> Vec<ActionSpec> {
        vec![
            ActionSpec::new(
                "get_order_status",
                "Look up the status of a user order by ID.",
                json!({"type": "object", "properties": {"order_id": {"type": "string"}}}),
            ),
            ActionSpec::new(
                "cancel_order",
                "Cancels a user order by ID.",
                json!({"type": "object", "properties": {"order_id": {"type": "string"}}}),
            ),
            ActionSpec::complete_or_escalate(),
        ]
    }

    #[tokio::test]
    async fn test_mock_picks_best_keyword_action() {
        let actions = order_actions();
        let messages = vec![Message::user("please cancel order 42")];
        let reply = MockLlmClient
            .complete(CompletionRequest { system: "", messages: &messages, actions: &actions })
            .await
            .unwrap();
        let action = reply.first_action().unwrap();
        assert_eq!(action.name, "cancel_order");
        assert_eq!(action.args, json!({"order_id": "42"}));
    }

    #[tokio::test]
    async fn test_mock_relays_tool_result() {
        let actions = order_actions();
        let call = ActionRequest::new("get_order_status", json!({"order_id": "42"}));
        let messages = vec![
            Message::user("status of order 42"),
            Message::assistant_with_action("", call.clone()),
            Message::reply(call.id, "status: shipped"),
        ];
        let reply = MockLlmClient
            .complete(CompletionRequest { system: "", messages: &messages, actions: &actions })
            .await
            .unwrap();
        assert!(!reply.has_actions());
        assert_eq!(reply.content, "status: shipped");
    }

    #[tokio::test]
    async fn test_scripted_pops_in_order_and_records() {
        let llm = ScriptedLlmClient::new([Message::assistant("one"), Message::assistant("two")]);
        let actions = order_actions();
        let req = CompletionRequest { system: "sys", messages: &[], actions: &actions };
        assert_eq!(llm.complete(req).await.unwrap().content, "one");
        assert_eq!(llm.complete(req).await.unwrap().content, "two");
        assert!(llm.complete(req).await.is_err());
        let calls = llm.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].system, "sys");
        assert_eq!(calls[0].actions[1], "cancel_order");
    }
}

//! 模型文本输出解析
//!
//! 从文本中提取 JSON 动作请求 `{"action": "...", "args": {...}}`（支持 ```json 代码块）；
//! 没有可用 JSON 时视为直接回复。

use serde::Deserialize;
use serde_json::Value;

use crate::dialog::{ActionRequest, Message};

#[derive(Debug, Deserialize)]
struct ActionCall {
    #[serde(default)]
    action: String,
    #[serde(default)]
    args: Value,
}

/// 截取 JSON 片段及其前面的文字
fn split_json(trimmed: &str) -> Option<(&str, &str)> {
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let json = rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim());
        return Some((trimmed[..start].trim(), json));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| (trimmed[..start].trim(), &trimmed[start..=end]))
}

/// 解析为 assistant 消息；JSON 合法且 action 非空时附带一个动作请求
pub fn parse_action_request(output: &str) -> Message {
    let trimmed = output.trim();
    let Some((prefix, json_str)) = split_json(trimmed) else {
        return Message::assistant(trimmed);
    };
    match serde_json::from_str::<ActionCall>(json_str) {
        Ok(call) if !call.action.is_empty() => {
            let args = if call.args.is_null() {
                Value::Object(Default::default())
            } else {
                call.args
            };
            Message::assistant_with_action(prefix, ActionRequest::new(call.action, args))
        }
        Ok(_) => Message::assistant(trimmed),
        Err(e) => {
            tracing::debug!(error = %e, "model output is not an action request");
            Message::assistant(trimmed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_text_is_reply() {
        let msg = parse_action_request("Your order has shipped.");
        assert!(!msg.has_actions());
        assert_eq!(msg.content, "Your order has shipped.");
    }

    #[test]
    fn test_json_block_with_prefix() {
        let msg = parse_action_request(
            "Let me check.\n```json\n{\"action\": \"get_order_status\", \"args\": {\"order_id\": \"42\"}}\n```",
        );
        let action = msg.first_action().unwrap();
        assert_eq!(action.name, "get_order_status");
        assert_eq!(action.args, json!({"order_id": "42"}));
        assert_eq!(msg.content, "Let me check.");
    }

    #[test]
    fn test_bare_json_without_args() {
        let msg = parse_action_request(r#"{"action": "CompleteOrEscalate"}"#);
        assert_eq!(msg.first_action().unwrap().args, json!({}));
    }

    #[test]
    fn test_invalid_or_empty_action_is_reply() {
        assert!(!parse_action_request("{not json}").has_actions());
        assert!(!parse_action_request(r#"{"action": ""}"#).has_actions());
    }
}

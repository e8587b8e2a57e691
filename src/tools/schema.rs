//! 动作请求 JSON Schema 生成
//!
//! 注入 system prompt，约束模型输出 `{"action": "...", "args": {...}}`，减少格式错误。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 动作请求格式：与 llm::parse 解析的结构一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ActionCallFormat {
    /// 动作名：工具名、入口动作名或 CompleteOrEscalate
    pub action: String,
    /// 动作参数，依动作不同而不同
    pub args: Value,
}

pub fn action_call_schema_json() -> String {
    let schema = schema_for!(ActionCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}

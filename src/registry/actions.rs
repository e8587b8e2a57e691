//! 动作描述与路由信号
//!
//! ActionSpec 是提供给模型的「可发出的动作」清单条目；交接与 CompleteOrEscalate 的参数 schema
//! 由 schemars 从类型自动生成。

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 委托 Agent 交还控制权给 supervisor 的通用信号
pub const COMPLETE_OR_ESCALATE: &str = "CompleteOrEscalate";

/// 模型可发出的动作：名称、描述、参数 JSON Schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// supervisor 用来把任务交给某个委托 Agent 的入口动作
    pub fn entry(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, schema_value::<HandoffRequest>())
    }

    pub fn complete_or_escalate() -> Self {
        Self::new(
            COMPLETE_OR_ESCALATE,
            "Indicates that the control flow should be passed back to the supervisor agent. \
             This happens if the assistant completed the task, needs more input, or the task is no longer relevant.",
            schema_value::<CompleteOrEscalate>(),
        )
    }
}

/// 入口动作的参数
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HandoffRequest {
    /// Any necessary followup questions the specialized assistant should clarify before proceeding.
    pub request: String,
}

/// 交还原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Completed,
    UserChangedMind,
    NeedMoreInfo,
    OutOfScope,
}

/// CompleteOrEscalate 的参数
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompleteOrEscalate {
    pub status: CompletionStatus,
    /// Short explanation for the supervisor.
    #[serde(default)]
    pub detail: String,
}

impl CompleteOrEscalate {
    /// 宽松解析：参数缺失或格式不对时返回 None，不影响交还
    pub fn from_args(args: &Value) -> Option<Self> {
        serde_json::from_value(args.clone()).ok()
    }
}

fn schema_value<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
}

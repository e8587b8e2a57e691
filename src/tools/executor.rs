//! 工具执行器
//!
//! 持有只读注册表与统一超时，execute(owner, tool_name, args) 只在 owner 的工具范围内查找并在超时内调用；
//! 每次调用输出一行结构化审计日志（JSON）。失败由调用方转成回复消息，不会中断状态机。

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::timeout;

use crate::registry::Registries;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    Unknown(String),

    #[error("{0}")]
    Failed(String),

    #[error("Tool {0} timed out")]
    Timeout(String),
}

pub struct ToolExecutor {
    registries: Arc<Registries>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registries: Arc<Registries>, timeout_secs: u64) -> Self {
        Self {
            registries,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn execute(
        &self,
        owner: &str,
        tool_name: &str,
        args: serde_json::Value,
    ) -> Result<String, ToolError> {
        let tool = self
            .registries
            .agents
            .by_identifier(owner)
            .and_then(|agent| {
                self.registries
                    .scoped_tools(agent)
                    .into_iter()
                    .find(|t| t.name() == tool_name)
            })
            .ok_or_else(|| ToolError::Unknown(tool_name.to_string()))?;

        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, tool.execute(args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "owner": owner,
            "sensitivity": tool.sensitivity().to_string(),
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(ToolError::Failed(e)),
            Err(_) => Err(ToolError::Timeout(tool_name.to_string())),
        }
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::registry::{AgentCatalog, Tool, ToolRegistry};

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps"
        }

        fn domain(&self) -> &str {
            "knowledge_base"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "always fails"
        }

        fn domain(&self) -> &str {
            "knowledge_base"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            Err("backend unavailable".into())
        }
    }

    fn executor() -> ToolExecutor {
        let mut tools = ToolRegistry::new();
        tools.register(SlowTool).unwrap();
        tools.register(FailingTool).unwrap();
        let agents = AgentCatalog::builtin().unwrap().into_registry().unwrap();
        let registries = Registries::new(agents, tools).unwrap().into_shared();
        ToolExecutor::new(registries, 30).with_timeout(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_timeout_maps_to_error() {
        let err = executor().execute("knowledge_base", "slow", json!({})).await.unwrap_err();
        assert_eq!(err, ToolError::Timeout("slow".into()));
    }

    #[tokio::test]
    async fn test_failure_and_unknown() {
        let exec = executor();
        assert_eq!(
            exec.execute("knowledge_base", "broken", json!({})).await.unwrap_err(),
            ToolError::Failed("backend unavailable".into())
        );
        assert_eq!(
            exec.execute("knowledge_base", "nope", json!({})).await.unwrap_err(),
            ToolError::Unknown("nope".into())
        );
    }

    #[tokio::test]
    async fn test_tool_outside_owner_scope_is_unknown() {
        let exec = executor();
        assert_eq!(
            exec.execute("order_management", "broken", json!({})).await.unwrap_err(),
            ToolError::Unknown("broken".into())
        );
        assert_eq!(
            exec.execute("ghost", "broken", json!({})).await.unwrap_err(),
            ToolError::Unknown("broken".into())
        );
    }

    #[test]
    fn test_args_preview_truncates() {
        let long = json!({"text": "x".repeat(500)});
        assert!(args_preview(&long).ends_with("..."));
        assert_eq!(args_preview(&json!({"a": 1})), r#"{"a":1}"#);
    }
}

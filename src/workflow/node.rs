//! 节点执行器
//!
//! `AgentNode`：渲染 Agent 的 prompt（注入 Profile），在超时内调用 LLM，把输出追加到历史。
//! LLM 失败或超时降级为一条不带动作的 assistant 消息，本轮随之结束。
//! `run_tool`：执行最近一次输出的第一个动作请求，结果（或失败说明）作为关联回复追加。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::core::RoutingError;
use crate::dialog::{DialogState, Message, Role};
use crate::llm::{CompletionRequest, LlmClient};
use crate::registry::{AgentRegistration, Registries};
use crate::tools::ToolExecutor;

pub struct AgentNode {
    llm: Arc<dyn LlmClient>,
    registries: Arc<Registries>,
    timeout: Duration,
}

impl AgentNode {
    pub fn new(llm: Arc<dyn LlmClient>, registries: Arc<Registries>, timeout: Duration) -> Self {
        Self {
            llm,
            registries,
            timeout,
        }
    }

    pub async fn run(&self, agent: &AgentRegistration, state: &mut DialogState) {
        let system = agent.render_prompt(state.profile());
        let actions = self.registries.actions_for(agent);
        let request = CompletionRequest {
            system: &system,
            messages: state.messages(),
            actions: &actions,
        };

        let output = match timeout(self.timeout, self.llm.complete(request)).await {
            Ok(Ok(mut message)) => {
                message.role = Role::Assistant;
                message.reply_to = None;
                message
            }
            Ok(Err(e)) => {
                tracing::warn!(agent = %agent.id, error = %e, "LLM call failed");
                Message::assistant(format!(
                    "Sorry, I could not complete that request ({e}). Please try again."
                ))
            }
            Err(_) => {
                tracing::warn!(agent = %agent.id, timeout_secs = self.timeout.as_secs(), "LLM call timed out");
                Message::assistant("Sorry, the request timed out. Please try again.")
            }
        };

        tracing::debug!(
            agent = %agent.id,
            actions = output.action_requests.len(),
            "agent output"
        );

        // 只执行第一个动作；其余动作立即得到说明性回复，不静默丢弃
        let extras: Vec<Message> = output
            .action_requests
            .iter()
            .skip(1)
            .map(|extra| {
                Message::reply(
                    extra.id.clone(),
                    format!(
                        "Action `{}` was not executed: only one action request per turn is supported. \
                         Request it again after the current action completes.",
                        extra.name
                    ),
                )
            })
            .collect();
        if !extras.is_empty() {
            tracing::warn!(agent = %agent.id, skipped = extras.len(), "multiple action requests in one output");
        }
        state.merge(std::iter::once(output).chain(extras));
    }
}

/// 工具失败时回填给 Agent 的内容
pub fn tool_error_reply(failure: &str) -> String {
    format!("Error: {failure}\n Please fix your mistakes.")
}

/// 执行最近输出中的第一个动作请求
pub async fn run_tool(
    executor: &ToolExecutor,
    state: &mut DialogState,
    owner: &str,
) -> Result<(), RoutingError> {
    let action = state
        .last_agent_output()
        .and_then(|m| m.first_action())
        .cloned()
        .ok_or_else(|| RoutingError::MissingActionRequest(owner.to_string()))?;

    let content = match executor.execute(owner, &action.name, action.args.clone()).await {
        Ok(content) => content,
        Err(e) => tool_error_reply(&e.to_string()),
    };
    state.push_message(Message::reply(action.id, content));
    Ok(())
}

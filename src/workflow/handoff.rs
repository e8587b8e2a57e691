//! 交接协议：enter（supervisor -> 委托 Agent）与 leave（委托 Agent -> supervisor）
//!
//! enter 压栈并以回复 supervisor 入口动作的形式注入一条作用域说明；
//! leave 出栈，若委托 Agent 最后的输出带动作请求则补一条「回到 supervisor」的回复。

use crate::core::RoutingError;
use crate::dialog::{DialogState, Message};
use crate::registry::{AgentRegistration, CompleteOrEscalate};

pub const LEAVE_NOTE: &str = "Resuming dialog with the supervisor. \
Please reflect on the past conversation and assist the user as needed.";

/// 进入委托 Agent 时注入的说明
pub fn entry_note(agent_label: &str) -> String {
    format!(
        "The assistant is now the {agent_label}. \
Reflect on the above conversation between the supervisor agent and the user.\n\
The user's intent is unsatisfied. Use the provided tools to assist the user.\n\
The task is not complete until you have successfully invoked the appropriate tool.\n\
If the user changes their mind, or needs help with other tasks, \
call the 'CompleteOrEscalate' action to let the supervisor agent take control.\n\
Do not mention who you are - just act as a proxy assistant for the supervisor.\n\
Remember, you are {agent_label}."
    )
}

pub fn enter(state: &mut DialogState, agent: &AgentRegistration) -> Result<(), RoutingError> {
    let action_id = state
        .last_agent_output()
        .and_then(|m| m.first_action())
        .map(|a| a.id.clone())
        .ok_or_else(|| RoutingError::MissingActionRequest(agent.id.clone()))?;
    state.push_owner(agent.id.clone());
    state.push_message(Message::reply(action_id, entry_note(&agent.label)));
    tracing::info!(agent = %agent.id, depth = state.ownership_stack().len(), "entered delegate");
    Ok(())
}

pub fn leave(state: &mut DialogState) {
    let pending = state
        .last_agent_output()
        .and_then(|m| m.first_action())
        .cloned();
    let left = state.pop_owner();
    let status = pending
        .as_ref()
        .and_then(|a| CompleteOrEscalate::from_args(&a.args))
        .map(|c| c.status);
    if let Some(action) = pending {
        state.push_message(Message::reply(action.id, LEAVE_NOTE));
    }
    tracing::info!(agent = ?left, status = ?status, depth = state.ownership_stack().len(), "left delegate");
}

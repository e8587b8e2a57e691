//! 路由引擎：由当前 DialogState 与最近一次节点输出决定下一节点
//!
//! 四个决策都是纯函数：入口路由、supervisor 之后、委托 Agent 之后、敏感级别分类
//! （分类是注册时固定的查表，见 `Registries::classify`）。只检查输出中的第一个动作请求。

use crate::core::RoutingError;
use crate::dialog::{ActionRequest, DialogState};
use crate::registry::{AgentRegistry, Registries, Sensitivity, COMPLETE_OR_ESCALATE, SUPERVISOR_ID};
use crate::workflow::NodeId;

/// 最近一次 Agent 输出里的第一个动作请求
fn first_action(state: &DialogState) -> Option<&ActionRequest> {
    state.last_agent_output().and_then(|m| m.first_action())
}

/// 入口路由：栈空或栈顶不是已注册的委托 Agent 时回到 supervisor
pub fn route_to_workflow(state: &DialogState, agents: &AgentRegistry) -> NodeId {
    match state.ownership_stack().top() {
        None => NodeId::Supervisor,
        Some(top) => match agents.delegate(top) {
            Some(agent) => NodeId::Agent(agent.id.clone()),
            None => {
                tracing::warn!(owner = top, "ownership stack names an unknown agent, falling back to supervisor");
                NodeId::Supervisor
            }
        },
    }
}

/// supervisor 之后：无动作则结束本轮；入口动作交给对应 Agent 的 enter 节点；其他动作名是路由错误
pub fn route_supervisor(state: &DialogState, agents: &AgentRegistry) -> Result<NodeId, RoutingError> {
    let Some(action) = first_action(state) else {
        return Ok(NodeId::End);
    };
    agents
        .by_entry_action(&action.name)
        .map(|agent| NodeId::Enter(agent.id.clone()))
        .ok_or_else(|| RoutingError::UnknownAction {
            agent: SUPERVISOR_ID.to_string(),
            action: action.name.clone(),
        })
}

/// 委托 Agent 之后：无动作则结束；CompleteOrEscalate 离开；其余按 Agent 的工具范围分为 safe / sensitive
pub fn route_agent(
    state: &DialogState,
    registries: &Registries,
    agent_id: &str,
) -> Result<NodeId, RoutingError> {
    let agent = registries
        .agents
        .delegate(agent_id)
        .ok_or_else(|| RoutingError::UnknownAgent(agent_id.to_string()))?;
    let Some(action) = first_action(state) else {
        return Ok(NodeId::End);
    };
    if action.name == COMPLETE_OR_ESCALATE {
        return Ok(NodeId::LeaveSkill);
    }
    match registries.classify(agent, &action.name) {
        Some(Sensitivity::Sensitive) => Ok(NodeId::SensitiveTools(agent.id.clone())),
        Some(Sensitivity::Safe) => Ok(NodeId::SafeTools(agent.id.clone())),
        None => Err(RoutingError::UnknownAction {
            agent: agent.id.clone(),
            action: action.name.clone(),
        }),
    }
}

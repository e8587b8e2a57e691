//! 注册表层：动作描述、工具注册表、Agent 注册表、目录加载
//!
//! `Registries` 在启动时构建一次并通过 Arc 注入引擎，运行期只读。

pub mod actions;
pub mod agents;
pub mod catalog;
pub mod tools;

use std::sync::Arc;

pub use actions::{ActionSpec, CompleteOrEscalate, CompletionStatus, HandoffRequest, COMPLETE_OR_ESCALATE};
pub use agents::{AgentRegistration, AgentRegistry, SUPERVISOR_ID};
pub use catalog::AgentCatalog;
pub use tools::{parse_args, Sensitivity, Tool, ToolRegistry};

use crate::core::RegistryError;

/// Agent 与工具注册表的组合，附带交叉校验
pub struct Registries {
    pub agents: AgentRegistry,
    pub tools: ToolRegistry,
}

impl Registries {
    /// 入口动作与 CompleteOrEscalate 不能与工具重名，否则路由会产生歧义
    pub fn new(agents: AgentRegistry, tools: ToolRegistry) -> Result<Self, RegistryError> {
        if tools.contains(COMPLETE_OR_ESCALATE) {
            return Err(RegistryError::DuplicateTool(COMPLETE_OR_ESCALATE.to_string()));
        }
        for agent in agents.delegates() {
            if let Some(entry) = agent.entry_action_name() {
                if tools.contains(entry) || entry == COMPLETE_OR_ESCALATE {
                    return Err(RegistryError::EntryActionShadowsTool {
                        action: entry.to_string(),
                        agent: agent.id.clone(),
                    });
                }
            }
        }
        tracing::info!(
            agents = agents.delegates().len() + 1,
            tools = tools.len(),
            "registries ready"
        );
        Ok(Self { agents, tools })
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 某个 Agent 可使用的工具
    pub fn scoped_tools(&self, agent: &AgentRegistration) -> Vec<Arc<dyn Tool>> {
        agent
            .tool_tags
            .iter()
            .flat_map(|tag| self.tools.by_domain(tag))
            .collect()
    }

    /// 在 Agent 的工具范围内查敏感级别
    pub fn classify(&self, agent: &AgentRegistration, action: &str) -> Option<Sensitivity> {
        self.tools
            .classify(agent.tool_tags.iter().map(String::as_str), action)
    }

    /// 提供给模型的动作清单：supervisor 为全部入口动作；委托 Agent 为其工具加 CompleteOrEscalate
    pub fn actions_for(&self, agent: &AgentRegistration) -> Vec<ActionSpec> {
        if agent.is_supervisor() {
            return self.agents.supervisor_actions();
        }
        let mut specs: Vec<ActionSpec> = agent
            .tool_tags
            .iter()
            .flat_map(|tag| self.tools.action_specs(tag))
            .collect();
        specs.push(ActionSpec::complete_or_escalate());
        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::default_tool_registry;

    fn builtin_agents() -> AgentRegistry {
        AgentCatalog::builtin().unwrap().into_registry().unwrap()
    }

    #[test]
    fn test_builtin_registries_validate() {
        let registries = Registries::new(builtin_agents(), default_tool_registry().unwrap()).unwrap();
        let orders = registries.agents.delegate("order_management").unwrap();
        assert_eq!(registries.classify(orders, "cancel_order"), Some(Sensitivity::Sensitive));
        assert_eq!(registries.classify(orders, "faq_lookup"), None);

        let names: Vec<_> = registries.actions_for(orders).into_iter().map(|a| a.name).collect();
        assert!(names.contains(&"get_order_status".to_string()));
        assert_eq!(names.last().map(String::as_str), Some(COMPLETE_OR_ESCALATE));

        let sup_actions = registries.actions_for(registries.agents.supervisor());
        assert_eq!(sup_actions.len(), 3);
    }

    #[test]
    fn test_entry_action_colliding_with_tool_is_fatal() {
        let source = r#"
            [supervisor]
            prompt = "sup"

            [[agents]]
            id = "orders"
            label = "Orders"
            domain = "order_management"
            entry_action = "cancel_order"
            prompt = "p"
        "#;
        let agents = AgentCatalog::from_toml_str(source).unwrap().into_registry().unwrap();
        let err = Registries::new(agents, default_tool_registry().unwrap())
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::EntryActionShadowsTool { .. }));
    }
}

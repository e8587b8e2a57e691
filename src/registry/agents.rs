//! Agent 注册表：一个 supervisor + N 个委托 Agent
//!
//! 启动时构建一次，之后只读。每个委托 Agent 绑定 domain 标签、prompt 模板和唯一的入口动作；
//! supervisor 没有 domain，也没有自己的入口动作，它能发出的动作恰好是全部委托 Agent 的入口动作。

use std::collections::HashMap;

use super::actions::ActionSpec;
use crate::core::RegistryError;
use crate::dialog::Profile;
use crate::workflow::NodeId;

pub const SUPERVISOR_ID: &str = "supervisor";

/// prompt 模板中的 Profile 占位符
pub const PROFILE_PLACEHOLDER: &str = "{user_profile}";

#[derive(Clone, Debug)]
pub struct AgentRegistration {
    pub id: String,
    pub label: String,
    pub prompt_template: String,
    pub domain: Option<String>,
    pub entry_action: Option<ActionSpec>,
    /// 可使用的工具 domain 集合，默认只含自身 domain
    pub tool_tags: Vec<String>,
}

impl AgentRegistration {
    pub fn supervisor(prompt_template: impl Into<String>) -> Self {
        Self {
            id: SUPERVISOR_ID.to_string(),
            label: "Supervisor".to_string(),
            prompt_template: prompt_template.into(),
            domain: None,
            entry_action: None,
            tool_tags: Vec::new(),
        }
    }

    pub fn delegate(
        id: impl Into<String>,
        label: impl Into<String>,
        domain: impl Into<String>,
        prompt_template: impl Into<String>,
        entry_action: ActionSpec,
    ) -> Self {
        let domain = domain.into();
        Self {
            id: id.into(),
            label: label.into(),
            prompt_template: prompt_template.into(),
            tool_tags: vec![domain.clone()],
            domain: Some(domain),
            entry_action: Some(entry_action),
        }
    }

    pub fn with_tool_tags(mut self, tags: Vec<String>) -> Self {
        if !tags.is_empty() {
            self.tool_tags = tags;
        }
        self
    }

    pub fn is_supervisor(&self) -> bool {
        self.entry_action.is_none() && self.domain.is_none()
    }

    pub fn entry_action_name(&self) -> Option<&str> {
        self.entry_action.as_ref().map(|a| a.name.as_str())
    }

    /// 用 Profile 填充模板
    pub fn render_prompt(&self, profile: &Profile) -> String {
        self.prompt_template
            .replace(PROFILE_PLACEHOLDER, &profile.render())
    }
}

#[derive(Clone, Debug)]
pub struct AgentRegistry {
    supervisor: AgentRegistration,
    delegates: Vec<AgentRegistration>,
    by_id: HashMap<String, usize>,
    by_entry: HashMap<String, usize>,
}

impl AgentRegistry {
    /// 校验：标识唯一；每个委托 Agent 有 domain 和入口动作；入口动作只能解析到唯一的 Agent
    pub fn new(
        supervisor: AgentRegistration,
        delegates: Vec<AgentRegistration>,
    ) -> Result<Self, RegistryError> {
        let mut by_id = HashMap::new();
        let mut entry_owners: HashMap<String, Vec<String>> = HashMap::new();

        for (idx, agent) in delegates.iter().enumerate() {
            if agent.id == supervisor.id || by_id.insert(agent.id.clone(), idx).is_some() {
                return Err(RegistryError::DuplicateAgent(agent.id.clone()));
            }
            if !NodeId::is_agent_name(&agent.id) {
                return Err(RegistryError::ReservedAgentId(agent.id.clone()));
            }
            if agent.domain.is_none() {
                return Err(RegistryError::MissingDomain(agent.id.clone()));
            }
            let entry = agent
                .entry_action_name()
                .ok_or_else(|| RegistryError::MissingEntryAction(agent.id.clone()))?;
            entry_owners
                .entry(entry.to_string())
                .or_default()
                .push(agent.id.clone());
        }

        let mut by_entry = HashMap::new();
        for (action, agents) in entry_owners {
            if agents.len() > 1 {
                return Err(RegistryError::AmbiguousEntryAction { action, agents });
            }
            by_entry.insert(action, by_id[&agents[0]]);
        }

        tracing::debug!(
            delegates = delegates.len(),
            "agent registry built"
        );

        Ok(Self {
            supervisor,
            delegates,
            by_id,
            by_entry,
        })
    }

    pub fn supervisor(&self) -> &AgentRegistration {
        &self.supervisor
    }

    /// 按标识查找（含 supervisor）
    pub fn by_identifier(&self, id: &str) -> Option<&AgentRegistration> {
        if id == self.supervisor.id {
            return Some(&self.supervisor);
        }
        self.delegate(id)
    }

    /// 只查委托 Agent
    pub fn delegate(&self, id: &str) -> Option<&AgentRegistration> {
        self.by_id.get(id).map(|&idx| &self.delegates[idx])
    }

    pub fn delegates(&self) -> &[AgentRegistration] {
        &self.delegates
    }

    /// supervisor 在前，其余按注册顺序
    pub fn all(&self) -> impl Iterator<Item = &AgentRegistration> {
        std::iter::once(&self.supervisor).chain(self.delegates.iter())
    }

    /// 入口动作名 -> 委托 Agent
    pub fn by_entry_action(&self, action: &str) -> Option<&AgentRegistration> {
        self.by_entry.get(action).map(|&idx| &self.delegates[idx])
    }

    /// supervisor 能发出的动作：全部委托 Agent 的入口动作
    pub fn supervisor_actions(&self) -> Vec<ActionSpec> {
        self.delegates
            .iter()
            .filter_map(|a| a.entry_action.clone())
            .collect()
    }
}

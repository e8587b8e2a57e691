//! 工作流节点图
//!
//! 节点有稳定的字符串名，挂起/恢复时只需序列化一个节点名：
//! `supervisor`、`<agent_id>`、`enter_<id>`、`safe_tools_<id>`、`sensitive_tools_<id>`、`leave_skill`、`__end__`。
//! 边表在启动时按 Agent 注册表生成：静态边直接给出下一节点，条件边交给 routing 中对应的路由函数。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::registry::{AgentRegistry, SUPERVISOR_ID};

const ENTER_PREFIX: &str = "enter_";
const SAFE_PREFIX: &str = "safe_tools_";
const SENSITIVE_PREFIX: &str = "sensitive_tools_";
const LEAVE: &str = "leave_skill";
const END: &str = "__end__";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum NodeId {
    Supervisor,
    Agent(String),
    Enter(String),
    SafeTools(String),
    SensitiveTools(String),
    LeaveSkill,
    End,
}

impl NodeId {
    /// 节点所属的委托 Agent
    pub fn owner(&self) -> Option<&str> {
        match self {
            NodeId::Agent(id) | NodeId::Enter(id) | NodeId::SafeTools(id) | NodeId::SensitiveTools(id) => {
                Some(id)
            }
            _ => None,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, NodeId::End)
    }

    /// 该标识作为 Agent 节点名能否原样解析回 Agent 节点（不与保留名或前缀冲突）
    pub fn is_agent_name(id: &str) -> bool {
        matches!(id.parse::<NodeId>(), Ok(NodeId::Agent(parsed)) if parsed == id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Supervisor => f.write_str(SUPERVISOR_ID),
            NodeId::Agent(id) => f.write_str(id),
            NodeId::Enter(id) => write!(f, "{ENTER_PREFIX}{id}"),
            NodeId::SafeTools(id) => write!(f, "{SAFE_PREFIX}{id}"),
            NodeId::SensitiveTools(id) => write!(f, "{SENSITIVE_PREFIX}{id}"),
            NodeId::LeaveSkill => f.write_str(LEAVE),
            NodeId::End => f.write_str(END),
        }
    }
}

impl FromStr for NodeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("empty node name".to_string());
        }
        Ok(match s {
            SUPERVISOR_ID => NodeId::Supervisor,
            LEAVE => NodeId::LeaveSkill,
            END => NodeId::End,
            _ => {
                if let Some(id) = s.strip_prefix(SENSITIVE_PREFIX) {
                    NodeId::SensitiveTools(id.to_string())
                } else if let Some(id) = s.strip_prefix(SAFE_PREFIX) {
                    NodeId::SafeTools(id.to_string())
                } else if let Some(id) = s.strip_prefix(ENTER_PREFIX) {
                    NodeId::Enter(id.to_string())
                } else {
                    NodeId::Agent(s.to_string())
                }
            }
        })
    }
}

impl From<NodeId> for String {
    fn from(node: NodeId) -> Self {
        node.to_string()
    }
}

impl TryFrom<String> for NodeId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 出边：静态边或条件路由
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Edge {
    Static(NodeId),
    /// supervisor 之后按入口动作路由
    RouteSupervisor,
    /// 委托 Agent 之后按动作路由（工具 / 挂起 / 离开）
    RouteAgent(String),
}

/// 工作流节点图
pub struct WorkflowGraph {
    /// 节点 -> 出边
    edges: HashMap<NodeId, Edge>,
    /// 执行前需要人工确认的节点
    interrupt_before: HashSet<NodeId>,
}

impl WorkflowGraph {
    pub fn new(agents: &AgentRegistry) -> Self {
        let mut edges = HashMap::new();
        let mut interrupt_before = HashSet::new();

        edges.insert(NodeId::Supervisor, Edge::RouteSupervisor);
        edges.insert(NodeId::LeaveSkill, Edge::Static(NodeId::End));

        for agent in agents.delegates() {
            let id = agent.id.clone();
            let back = Edge::Static(NodeId::Agent(id.clone()));
            edges.insert(NodeId::Enter(id.clone()), back.clone());
            edges.insert(NodeId::Agent(id.clone()), Edge::RouteAgent(id.clone()));
            edges.insert(NodeId::SafeTools(id.clone()), back.clone());
            edges.insert(NodeId::SensitiveTools(id.clone()), back);
            interrupt_before.insert(NodeId::SensitiveTools(id));
        }

        Self {
            edges,
            interrupt_before,
        }
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        node.is_end() || self.edges.contains_key(node)
    }

    pub fn edge(&self, node: &NodeId) -> Option<&Edge> {
        self.edges.get(node)
    }

    pub fn interrupts_before(&self, node: &NodeId) -> bool {
        self.interrupt_before.contains(node)
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }
}

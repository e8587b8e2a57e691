//! 工作流引擎
//!
//! 驱动一轮对话：合并输入 -> 入口路由 -> 依边表逐节点执行，直到结束（Terminated）或停在敏感工具前（Suspended）。
//! 每个步骤之后整体写回 Checkpoint；同一 thread 的轮次按到达顺序串行，不同 thread 完全并行。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;

use crate::core::{RoutingError, TurnError};
use crate::dialog::{ActionRequest, DialogState, Message, Profile, ProfileProvider};
use crate::llm::LlmClient;
use crate::memory::UserMemoryManager;
use crate::registry::Registries;
use crate::tools::ToolExecutor;
use crate::workflow::checkpoint::{Checkpoint, CheckpointStore};
use crate::workflow::graph::{Edge, NodeId, WorkflowGraph};
use crate::workflow::node::{run_tool, AgentNode};
use crate::workflow::{handoff, routing};

/// 一轮的输入
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnInput {
    /// 新的用户消息；挂起期间视为带理由的拒绝
    Text(String),
    /// 无新输入：继续未完成的步骤
    Resume,
    /// 批准待确认的敏感动作
    Approve,
    /// 拒绝待确认的敏感动作
    Reject { reason: Option<String> },
}

/// 客户端确认信号
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Accepted,
    Rejected,
}

impl FromStr for Confirmation {
    type Err = TurnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "accepted" => Ok(Confirmation::Accepted),
            "rejected" => Ok(Confirmation::Rejected),
            other => Err(TurnError::InvalidConfirmation(other.to_string())),
        }
    }
}

/// 一轮调用：(thread_id, user_id, 输入)
#[derive(Clone, Debug)]
pub struct TurnRequest {
    pub thread_id: String,
    pub user_id: String,
    pub input: TurnInput,
}

impl TurnRequest {
    pub fn new(thread_id: impl Into<String>, user_id: impl Into<String>, input: TurnInput) -> Self {
        Self {
            thread_id: thread_id.into(),
            user_id: user_id.into(),
            input,
        }
    }

    pub fn text(thread_id: impl Into<String>, user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(thread_id, user_id, TurnInput::Text(text.into()))
    }

    /// 由外部接口的原始字段组装：confirmation 只接受 accepted / rejected；
    /// 拒绝时 text 作为理由；都没有时表示继续
    pub fn from_parts(
        thread_id: impl Into<String>,
        user_id: impl Into<String>,
        text: Option<String>,
        confirmation: Option<&str>,
    ) -> Result<Self, TurnError> {
        let text = text.filter(|t| !t.trim().is_empty());
        let input = match confirmation.map(str::parse::<Confirmation>).transpose()? {
            Some(Confirmation::Accepted) => TurnInput::Approve,
            Some(Confirmation::Rejected) => TurnInput::Reject { reason: text },
            None => match text {
                Some(t) => TurnInput::Text(t),
                None => TurnInput::Resume,
            },
        };
        Ok(Self::new(thread_id, user_id, input))
    }
}

/// 引擎状态机的阶段（仅用于日志）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    AwaitingInput,
    Routing,
    ExecutingAgent,
    ExecutingTool,
    Suspended,
    Terminated,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TurnPhase::AwaitingInput => "awaiting_input",
            TurnPhase::Routing => "routing",
            TurnPhase::ExecutingAgent => "executing_agent",
            TurnPhase::ExecutingTool => "executing_tool",
            TurnPhase::Suspended => "suspended",
            TurnPhase::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnStatus {
    Terminated,
    Suspended { node: NodeId, action: ActionRequest },
}

/// 一轮的结果：状态与 DialogState 快照
#[derive(Clone, Debug, Serialize)]
pub struct TurnOutcome {
    pub thread_id: String,
    #[serde(flatten)]
    pub status: TurnStatus,
    pub state: DialogState,
    /// 本轮执行的节点数
    pub steps: usize,
}

impl TurnOutcome {
    pub fn is_suspended(&self) -> bool {
        matches!(self.status, TurnStatus::Suspended { .. })
    }

    pub fn pending_action(&self) -> Option<&ActionRequest> {
        match &self.status {
            TurnStatus::Suspended { action, .. } => Some(action),
            TurnStatus::Terminated => None,
        }
    }

    /// 最近一条有文字的 assistant 消息
    pub fn last_reply(&self) -> Option<&str> {
        self.state
            .messages()
            .iter()
            .rev()
            .filter(|m| m.role == crate::dialog::Role::Assistant)
            .map(|m| m.content.as_str())
            .find(|c| !c.trim().is_empty())
    }
}

/// 引擎参数
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// 单轮最多执行的节点数
    pub recursion_limit: usize,
    pub llm_timeout: Duration,
    pub tool_timeout: Duration,
    pub profile_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            recursion_limit: 25,
            llm_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
            profile_timeout: Duration::from_secs(10),
        }
    }
}

/// 拒绝敏感动作时回填给 Agent 的内容
pub fn decline_reply(reason: Option<&str>) -> String {
    match reason {
        Some(reason) => format!(
            "Action denied by user. Reasoning: '{reason}'. Continue assisting, accounting for the user's input."
        ),
        None => "Action denied by user. Continue assisting without executing it.".to_string(),
    }
}

pub struct WorkflowEngine {
    registries: Arc<Registries>,
    graph: WorkflowGraph,
    agent_node: AgentNode,
    tools: ToolExecutor,
    store: Arc<dyn CheckpointStore>,
    profiles: Arc<dyn ProfileProvider>,
    memory: Arc<UserMemoryManager>,
    /// thread_id -> 会话锁（tokio Mutex 按到达顺序唤醒）
    thread_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
    settings: EngineSettings,
}

impl WorkflowEngine {
    pub fn new(
        registries: Arc<Registries>,
        llm: Arc<dyn LlmClient>,
        store: Arc<dyn CheckpointStore>,
        profiles: Arc<dyn ProfileProvider>,
        memory: Arc<UserMemoryManager>,
        settings: EngineSettings,
    ) -> Self {
        let graph = WorkflowGraph::new(&registries.agents);
        let agent_node = AgentNode::new(llm, Arc::clone(&registries), settings.llm_timeout);
        let tools = ToolExecutor::new(Arc::clone(&registries), 0).with_timeout(settings.tool_timeout);
        tracing::info!(nodes = graph.node_count(), recursion_limit = settings.recursion_limit, "workflow engine ready");
        Self {
            registries,
            graph,
            agent_node,
            tools,
            store,
            profiles,
            memory,
            thread_locks: RwLock::new(HashMap::new()),
            settings,
        }
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    pub fn memory(&self) -> &Arc<UserMemoryManager> {
        &self.memory
    }

    /// 读取会话当前的 Checkpoint
    pub async fn checkpoint(&self, thread_id: &str) -> Result<Option<Checkpoint>, TurnError> {
        if thread_id.trim().is_empty() {
            return Err(TurnError::MissingContext("thread_id"));
        }
        Ok(self.store.load(thread_id).await?)
    }

    async fn thread_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.thread_locks.read().await;
            if let Some(lock) = locks.get(thread_id) {
                return Arc::clone(lock);
            }
        }
        let mut locks = self.thread_locks.write().await;
        Arc::clone(locks.entry(thread_id.to_string()).or_default())
    }

    /// 没有其他轮次持有或等待该会话锁时，从表中移除
    async fn release_thread_lock(&self, thread_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.thread_locks.write().await;
        drop(lock);
        if locks
            .get(thread_id)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            locks.remove(thread_id);
        }
    }

    #[cfg(test)]
    async fn tracked_threads(&self) -> usize {
        self.thread_locks.read().await.len()
    }

    /// 新会话的 Profile：拉取成功则记入用户记忆；失败时用该用户记住的事实，再不行用哨兵值
    async fn fetch_profile(&self, thread_id: &str, user_id: &str) -> Profile {
        match timeout(self.settings.profile_timeout, self.profiles.fetch(thread_id)).await {
            Ok(Ok(profile)) if !profile.is_empty() && !profile.is_unknown() => {
                self.memory.remember(user_id, profile.clone()).await;
                return profile;
            }
            Ok(Ok(_)) => tracing::warn!(thread_id, "profile fetch returned nothing"),
            Ok(Err(e)) => tracing::warn!(thread_id, error = %e, "profile fetch failed"),
            Err(_) => tracing::warn!(thread_id, "profile fetch timed out"),
        }
        self.memory
            .recall(user_id)
            .await
            .unwrap_or_else(Profile::unknown)
    }

    /// 执行一轮
    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnOutcome, TurnError> {
        let TurnRequest {
            thread_id,
            user_id,
            input,
        } = request;
        if thread_id.trim().is_empty() {
            return Err(TurnError::MissingContext("thread_id"));
        }
        if user_id.trim().is_empty() {
            return Err(TurnError::MissingContext("user_id"));
        }

        let lock = self.thread_lock(&thread_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.run_locked(&thread_id, &user_id, input).await
        };
        self.release_thread_lock(&thread_id, lock).await;
        result
    }

    /// 持有会话锁时执行一轮
    async fn run_locked(
        &self,
        thread_id: &str,
        user_id: &str,
        input: TurnInput,
    ) -> Result<TurnOutcome, TurnError> {
        let thread_id = thread_id.to_string();
        tracing::debug!(thread_id = %thread_id, phase = %TurnPhase::AwaitingInput, input = ?input, "turn started");

        let existing = self.store.load(&thread_id).await?;
        let mut checkpoint = match existing {
            Some(cp) => cp,
            None => {
                if matches!(input, TurnInput::Approve | TurnInput::Reject { .. }) {
                    return Err(TurnError::InvalidConfirmation(
                        "no action is awaiting confirmation".to_string(),
                    ));
                }
                let profile = self.fetch_profile(&thread_id, &user_id).await;
                tracing::info!(thread_id = %thread_id, user_id = %user_id, "new thread");
                Checkpoint::new(thread_id.clone(), DialogState::new(profile))
            }
        };

        let mut approved = false;
        let start = match (input, checkpoint.pending_suspension.clone()) {
            (TurnInput::Resume, Some(_)) => {
                tracing::debug!(thread_id = %thread_id, "resume without confirmation, still suspended");
                return self.suspended_outcome(checkpoint, 0);
            }
            (TurnInput::Approve, Some(node)) => {
                tracing::info!(thread_id = %thread_id, node = %node, "sensitive action approved");
                approved = true;
                node
            }
            (TurnInput::Reject { reason }, Some(node)) => self.decline(&mut checkpoint, node, reason.as_deref()),
            (TurnInput::Text(text), Some(node)) => self.decline(&mut checkpoint, node, Some(&text)),
            (TurnInput::Approve | TurnInput::Reject { .. }, None) => {
                return Err(TurnError::InvalidConfirmation(
                    "no action is awaiting confirmation".to_string(),
                ));
            }
            (TurnInput::Text(text), None) => {
                if let Some(stale) = &checkpoint.next {
                    tracing::warn!(thread_id = %thread_id, node = %stale, "discarding unfinished step for new input");
                }
                checkpoint.state.merge([Message::user(text)]);
                routing::route_to_workflow(&checkpoint.state, &self.registries.agents)
            }
            (TurnInput::Resume, None) => match checkpoint.next.clone() {
                Some(node) => {
                    tracing::info!(thread_id = %thread_id, node = %node, "resuming unfinished turn");
                    node
                }
                None => return Ok(Self::terminated_outcome(checkpoint, 0)),
            },
        };

        let start = if self.graph.contains(&start) {
            start
        } else {
            tracing::warn!(thread_id = %thread_id, node = %start, "checkpoint names an unknown node, re-routing");
            approved = false;
            routing::route_to_workflow(&checkpoint.state, &self.registries.agents)
        };

        checkpoint.pending_suspension = None;
        checkpoint.next = Some(start.clone());
        checkpoint.resolved = false;
        checkpoint.touch();
        self.store.save(&checkpoint).await?;

        self.drive(checkpoint, start, approved).await
    }

    /// 拒绝：回填拒绝说明，控制权回到拥有该动作的 Agent
    fn decline(&self, checkpoint: &mut Checkpoint, node: NodeId, reason: Option<&str>) -> NodeId {
        tracing::info!(thread_id = %checkpoint.thread_id, node = %node, "sensitive action rejected");
        if let Some(action_id) = checkpoint.pending_action().map(|a| a.id.clone()) {
            checkpoint
                .state
                .push_message(Message::reply(action_id, decline_reply(reason)));
        }
        match node.owner() {
            Some(owner) => NodeId::Agent(owner.to_string()),
            None => routing::route_to_workflow(&checkpoint.state, &self.registries.agents),
        }
    }

    async fn drive(
        &self,
        mut checkpoint: Checkpoint,
        start: NodeId,
        mut skip_interrupt: bool,
    ) -> Result<TurnOutcome, TurnError> {
        let mut node = start;
        let mut steps = 0usize;

        loop {
            if node.is_end() {
                checkpoint.next = None;
                checkpoint.resolved = true;
                checkpoint.touch();
                self.store.save(&checkpoint).await?;
                tracing::info!(thread_id = %checkpoint.thread_id, phase = %TurnPhase::Terminated, steps, "turn finished");
                return Ok(Self::terminated_outcome(checkpoint, steps));
            }

            if self.graph.interrupts_before(&node) && !skip_interrupt {
                checkpoint.pending_suspension = Some(node.clone());
                checkpoint.next = Some(node);
                checkpoint.resolved = false;
                checkpoint.touch();
                self.store.save(&checkpoint).await?;
                return self.suspended_outcome(checkpoint, steps);
            }
            skip_interrupt = false;

            if steps >= self.settings.recursion_limit {
                tracing::error!(thread_id = %checkpoint.thread_id, node = %node, "step limit exceeded");
                checkpoint.next = None;
                checkpoint.resolved = true;
                checkpoint.touch();
                self.store.save(&checkpoint).await?;
                return Err(TurnError::StepLimitExceeded(self.settings.recursion_limit));
            }
            steps += 1;

            match self.step(&node, &mut checkpoint.state).await {
                Ok(next) => {
                    tracing::debug!(thread_id = %checkpoint.thread_id, from = %node, to = %next, "step committed");
                    checkpoint.next = Some(next.clone());
                    checkpoint.touch();
                    self.store.save(&checkpoint).await?;
                    node = next;
                }
                Err(e) => {
                    tracing::error!(thread_id = %checkpoint.thread_id, node = %node, error = %e, "routing failed");
                    checkpoint.next = None;
                    checkpoint.resolved = true;
                    checkpoint.touch();
                    self.store.save(&checkpoint).await?;
                    return Err(e.into());
                }
            }
        }
    }

    /// 执行单个节点，再按边表决定下一节点
    async fn step(&self, node: &NodeId, state: &mut DialogState) -> Result<NodeId, RoutingError> {
        let agents = &self.registries.agents;
        match node {
            NodeId::Supervisor => {
                tracing::debug!(node = %node, phase = %TurnPhase::ExecutingAgent, "running agent");
                self.agent_node.run(agents.supervisor(), state).await;
            }
            NodeId::Agent(id) => {
                let agent = agents
                    .delegate(id)
                    .ok_or_else(|| RoutingError::UnknownAgent(id.clone()))?;
                tracing::debug!(node = %node, phase = %TurnPhase::ExecutingAgent, "running agent");
                self.agent_node.run(agent, state).await;
            }
            NodeId::Enter(id) => {
                let agent = agents
                    .delegate(id)
                    .ok_or_else(|| RoutingError::UnknownAgent(id.clone()))?;
                handoff::enter(state, agent)?;
            }
            NodeId::SafeTools(id) | NodeId::SensitiveTools(id) => {
                tracing::debug!(node = %node, phase = %TurnPhase::ExecutingTool, "running tool");
                run_tool(&self.tools, state, id).await?;
            }
            NodeId::LeaveSkill => handoff::leave(state),
            NodeId::End => return Ok(NodeId::End),
        }

        tracing::debug!(node = %node, phase = %TurnPhase::Routing, "routing");
        match self.graph.edge(node) {
            Some(Edge::Static(next)) => Ok(next.clone()),
            Some(Edge::RouteSupervisor) => routing::route_supervisor(state, agents),
            Some(Edge::RouteAgent(id)) => routing::route_agent(state, &self.registries, id),
            None => Err(RoutingError::UnknownAgent(node.to_string())),
        }
    }

    fn terminated_outcome(checkpoint: Checkpoint, steps: usize) -> TurnOutcome {
        TurnOutcome {
            thread_id: checkpoint.thread_id,
            status: TurnStatus::Terminated,
            state: checkpoint.state,
            steps,
        }
    }

    fn suspended_outcome(&self, checkpoint: Checkpoint, steps: usize) -> Result<TurnOutcome, TurnError> {
        let node = checkpoint
            .pending_suspension
            .clone()
            .ok_or_else(|| RoutingError::MissingActionRequest(checkpoint.thread_id.clone()))?;
        let action = checkpoint
            .pending_action()
            .cloned()
            .ok_or_else(|| RoutingError::MissingActionRequest(node.to_string()))?;
        tracing::info!(
            thread_id = %checkpoint.thread_id,
            phase = %TurnPhase::Suspended,
            node = %node,
            action = %action.name,
            "awaiting confirmation"
        );
        Ok(TurnOutcome {
            thread_id: checkpoint.thread_id,
            status: TurnStatus::Suspended { node, action },
            state: checkpoint.state,
            steps,
        })
    }
}

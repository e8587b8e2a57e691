//! 错误分类：配置错误（启动期致命）、路由错误（单轮致命）、存储错误与轮次错误
//!
//! 协作者（LLM、工具、Profile 拉取）的失败不在此处：它们在边界处被转为回复消息或哨兵值。

use thiserror::Error;

/// 注册表构建失败（启动期致命，不会在请求路径上出现）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Duplicate agent identifier: {0}")]
    DuplicateAgent(String),

    #[error("Entry action '{action}' is declared by more than one agent: {agents:?}")]
    AmbiguousEntryAction { action: String, agents: Vec<String> },

    #[error("Entry action '{action}' of agent '{agent}' collides with a registered tool")]
    EntryActionShadowsTool { action: String, agent: String },

    #[error("Agent identifier '{0}' collides with a reserved workflow node name")]
    ReservedAgentId(String),

    #[error("Delegate '{0}' declares no entry action")]
    MissingEntryAction(String),

    #[error("Delegate '{0}' declares no domain tag")]
    MissingDomain(String),

    #[error("Catalog error: {0}")]
    Catalog(String),
}

/// 路由决策失败：动作名与注册表不匹配，说明 prompt 与注册表不一致，不自动重试
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Unknown action '{action}' emitted by {agent}")]
    UnknownAction { agent: String, action: String },

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("No action request to dispatch for {0}")]
    MissingActionRequest(String),
}

/// Checkpoint 读写失败
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint storage error: {0}")]
    Storage(String),

    #[error("Checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 一轮对话执行失败的原因（返回给调用方）
#[derive(Error, Debug)]
pub enum TurnError {
    /// 缺少会话标识：立即拒绝，不修改任何状态
    #[error("Missing context: {0}")]
    MissingContext(&'static str),

    /// 客户端确认信号非法（或没有待确认的动作），状态不变
    #[error("Invalid confirmation: {0}")]
    InvalidConfirmation(String),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Step limit of {0} exceeded")]
    StepLimitExceeded(usize),
}

impl TurnError {
    /// 属于客户端输入问题（可直接返回 4xx）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TurnError::MissingContext(_) | TurnError::InvalidConfirmation(_)
        )
    }
}

//! 工作流编排：节点图与边表、路由、交接、节点执行、Checkpoint、引擎

pub mod checkpoint;
pub mod engine;
pub mod graph;
pub mod handoff;
pub mod node;
pub mod routing;

pub use checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
#[cfg(feature = "sqlite")]
pub use checkpoint::SqliteCheckpointStore;
pub use engine::{
    decline_reply, Confirmation, EngineSettings, TurnInput, TurnOutcome, TurnPhase, TurnRequest,
    TurnStatus, WorkflowEngine,
};
pub use graph::{Edge, NodeId, WorkflowGraph};
pub use node::{tool_error_reply, AgentNode};

//! Switchboard - 多 Agent 对话编排核心
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类与引擎构建器
//! - **dialog**: 对话状态（消息、归属栈、用户 Profile）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock / 脚本化）
//! - **memory**: 按用户隔离的事实记忆（Profile 回退）
//! - **observability**: tracing 初始化
//! - **registry**: Agent 与工具注册表（domain / sensitivity 标签）
//! - **tools**: 内置工具族与执行器
//! - **workflow**: 路由、交接、挂起/恢复、Checkpoint 与工作流引擎

pub mod config;
pub mod core;
pub mod dialog;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod registry;
pub mod tools;
pub mod workflow;

pub use core::{EngineBuilder, TurnError};
pub use workflow::{TurnInput, TurnOutcome, TurnRequest, TurnStatus, WorkflowEngine};

//! 记忆层：跨会话、按用户隔离的 Profile 事实

pub mod user_memory;

pub use user_memory::{UserFacts, UserMemoryConfig, UserMemoryManager};

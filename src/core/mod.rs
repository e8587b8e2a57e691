//! 核心：错误分类（配置、路由、存储、轮次）与引擎构建器

pub mod builder;
pub mod error;

pub use builder::{create_engine_builder, EngineBuilder};
pub use error::{CheckpointError, RegistryError, RoutingError, TurnError};

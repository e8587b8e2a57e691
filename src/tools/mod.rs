//! 工具层：执行器与三组演示工具族（订单、知识库、用户管理）
//!
//! `default_tool_registry` 注册全部内置工具；需要观察副作用时（例如测试取消订单）
//! 用 `ToolBackends` 持有共享的后端，再调用 `tool_registry_with`。

pub mod executor;
pub mod knowledge;
pub mod orders;
pub mod schema;
pub mod users;

use std::sync::Arc;

pub use executor::{ToolError, ToolExecutor};
pub use knowledge::{FaqLookupTool, KnowledgeBase, PrivateInfoLookupTool};
pub use orders::{CancelOrderTool, GetOrderEtaTool, GetOrderStatusTool, GetRefundStatusTool, OrderBook, OrderId};
pub use schema::action_call_schema_json;
pub use users::{Email, GetRecentEmailsTool, GetUserInfoTool, InMemoryMailbox, Mailbox, UserDirectory};

use crate::core::RegistryError;
use crate::registry::ToolRegistry;

/// 内置工具共享的后端
#[derive(Clone)]
pub struct ToolBackends {
    pub orders: Arc<OrderBook>,
    pub knowledge: Arc<KnowledgeBase>,
    pub directory: Arc<UserDirectory>,
    pub mailbox: Arc<dyn Mailbox>,
}

impl Default for ToolBackends {
    fn default() -> Self {
        Self {
            orders: Arc::new(OrderBook::new()),
            knowledge: Arc::new(KnowledgeBase::default()),
            directory: Arc::new(UserDirectory::new()),
            mailbox: Arc::new(InMemoryMailbox::new()),
        }
    }
}

/// 使用默认内存后端注册全部内置工具
pub fn default_tool_registry() -> Result<ToolRegistry, RegistryError> {
    tool_registry_with(&ToolBackends::default())
}

pub fn tool_registry_with(backends: &ToolBackends) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register(GetOrderStatusTool::new(backends.orders.clone()))?;
    registry.register(GetOrderEtaTool)?;
    registry.register(GetRefundStatusTool)?;
    registry.register(CancelOrderTool::new(backends.orders.clone()))?;
    registry.register(FaqLookupTool::new(backends.knowledge.clone()))?;
    registry.register(PrivateInfoLookupTool::new(backends.knowledge.clone()))?;
    registry.register(GetUserInfoTool::new(backends.directory.clone()))?;
    registry.register(GetRecentEmailsTool::new(backends.mailbox.clone()))?;
    Ok(registry)
}

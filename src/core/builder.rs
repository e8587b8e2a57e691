//! 引擎构建器：统一 CLI 与 Web 的初始化逻辑
//!
//! 按配置装配注册表、LLM、Checkpoint 存储、用户记忆与 Profile 协作者；各部件都可以注入替换（测试用）。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::config::{AppConfig, CheckpointBackend};
use crate::dialog::{ProfileProvider, StaticProfileProvider};
use crate::llm::{create_llm_from_config, LlmClient};
use crate::memory::{UserMemoryConfig, UserMemoryManager};
use crate::registry::{AgentCatalog, Registries};
use crate::tools::{tool_registry_with, ToolBackends};
use crate::workflow::{CheckpointStore, InMemoryCheckpointStore, WorkflowEngine};

pub struct EngineBuilder {
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    profiles: Option<Arc<dyn ProfileProvider>>,
    store: Option<Arc<dyn CheckpointStore>>,
    backends: ToolBackends,
}

impl EngineBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            profiles: None,
            store: None,
            backends: ToolBackends::default(),
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileProvider>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 替换工具后端（例如共享一个 OrderBook 以观察副作用）
    pub fn with_backends(mut self, backends: ToolBackends) -> Self {
        self.backends = backends;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 目录 + 工具注册表；任何校验失败都是启动期致命错误
    pub fn build_registries(&self) -> anyhow::Result<Arc<Registries>> {
        let catalog = match &self.config.app.catalog_path {
            Some(path) => AgentCatalog::load(path)
                .with_context(|| format!("Failed to load agent catalog {}", path.display()))?,
            None => AgentCatalog::builtin().context("Built-in agent catalog is invalid")?,
        };
        let agents = catalog.into_registry().context("Invalid agent catalog")?;
        let tools = tool_registry_with(&self.backends).context("Invalid tool registry")?;
        let registries = Registries::new(agents, tools).context("Registry validation failed")?;
        Ok(registries.into_shared())
    }

    pub async fn build_store(&self) -> anyhow::Result<Arc<dyn CheckpointStore>> {
        if let Some(store) = &self.store {
            return Ok(Arc::clone(store));
        }
        match self.config.checkpoint.backend {
            CheckpointBackend::Memory => Ok(Arc::new(InMemoryCheckpointStore::new())),
            CheckpointBackend::Sqlite => self.open_sqlite().await,
        }
    }

    #[cfg(feature = "sqlite")]
    async fn open_sqlite(&self) -> anyhow::Result<Arc<dyn CheckpointStore>> {
        let path = &self.config.checkpoint.sqlite_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let store = crate::workflow::SqliteCheckpointStore::open(path)
            .await
            .with_context(|| format!("Failed to open checkpoint database {}", path.display()))?;
        tracing::info!(path = %path.display(), "sqlite checkpoint store opened");
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "sqlite"))]
    async fn open_sqlite(&self) -> anyhow::Result<Arc<dyn CheckpointStore>> {
        anyhow::bail!("checkpoint backend 'sqlite' requires the `sqlite` feature")
    }

    pub fn build_memory(&self) -> Arc<UserMemoryManager> {
        Arc::new(UserMemoryManager::new(UserMemoryConfig {
            snapshot_dir: self.config.memory.snapshot_dir.clone(),
        }))
    }

    pub async fn build(self) -> anyhow::Result<WorkflowEngine> {
        let registries = self.build_registries()?;
        let store = self.build_store().await?;
        let memory = self.build_memory();
        let llm = self
            .llm
            .clone()
            .unwrap_or_else(|| create_llm_from_config(&self.config));
        let profiles: Arc<dyn ProfileProvider> = match &self.profiles {
            Some(p) => Arc::clone(p),
            None => Arc::new(StaticProfileProvider::new()),
        };
        Ok(WorkflowEngine::new(
            registries,
            llm,
            store,
            profiles,
            memory,
            self.config.engine_settings(),
        ))
    }
}

/// 便捷函数：加载配置（失败时回退默认值）并创建构建器
pub fn create_engine_builder(config_path: Option<PathBuf>) -> EngineBuilder {
    let config = crate::config::load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    EngineBuilder::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::TurnRequest;

    #[tokio::test]
    async fn test_default_build_runs_a_turn_with_mock() {
        let engine = EngineBuilder::new(AppConfig::default()).build().await.unwrap();
        let out = engine
            .run_turn(TurnRequest::text("t", "u", "hello there"))
            .await
            .unwrap();
        assert!(!out.is_suspended());
        assert!(out.last_reply().unwrap().starts_with("Mock reply"));
    }

    #[tokio::test]
    async fn test_missing_catalog_is_startup_error() {
        let mut config = AppConfig::default();
        config.app.catalog_path = Some(PathBuf::from("/nonexistent/agents.toml"));
        assert!(EngineBuilder::new(config).build_registries().is_err());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sqlite_backend_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.checkpoint.backend = CheckpointBackend::Sqlite;
        config.checkpoint.sqlite_path = dir.path().join("nested").join("cp.db");
        let builder = EngineBuilder::new(config);
        let store = builder.build_store().await.unwrap();
        assert!(store.thread_ids().await.unwrap().is_empty());
    }
}

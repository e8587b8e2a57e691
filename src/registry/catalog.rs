//! Agent 目录加载（TOML）
//!
//! 内置目录编译进二进制（config/agents.toml）；也可以用 `[app].catalog_path` 指向自定义目录。
//! prompt 可以内联，也可以用 prompt_file 指向相对于目录文件的路径。

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::actions::ActionSpec;
use super::agents::{AgentRegistration, AgentRegistry};
use crate::core::RegistryError;

pub const BUILTIN_CATALOG: &str = include_str!("../../config/agents.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorEntry {
    pub prompt: Option<String>,
    pub prompt_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentEntry {
    pub id: String,
    pub label: String,
    pub domain: String,
    pub entry_action: String,
    #[serde(default)]
    pub entry_description: String,
    pub prompt: Option<String>,
    pub prompt_file: Option<PathBuf>,
    #[serde(default)]
    pub tool_tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentCatalog {
    pub supervisor: SupervisorEntry,
    #[serde(default)]
    pub agents: Vec<AgentEntry>,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl AgentCatalog {
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, RegistryError> {
        toml::from_str(source).map_err(|e| RegistryError::Catalog(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::Catalog(format!("{}: {e}", path.display())))?;
        let mut catalog = Self::from_toml_str(&source)?;
        catalog.base_dir = path.parent().map(Path::to_path_buf);
        Ok(catalog)
    }

    /// 构建只读注册表；任何校验失败都是启动期致命错误
    pub fn into_registry(self) -> Result<AgentRegistry, RegistryError> {
        let supervisor_prompt = self.resolve_prompt(
            "supervisor",
            self.supervisor.prompt.as_deref(),
            self.supervisor.prompt_file.as_deref(),
        )?;
        let supervisor = AgentRegistration::supervisor(supervisor_prompt);

        let delegates = self
            .agents
            .iter()
            .map(|entry| {
                let prompt = self.resolve_prompt(
                    &entry.id,
                    entry.prompt.as_deref(),
                    entry.prompt_file.as_deref(),
                )?;
                let description = if entry.entry_description.is_empty() {
                    format!("Transfers work to the {}.", entry.label)
                } else {
                    entry.entry_description.clone()
                };
                Ok(AgentRegistration::delegate(
                    &entry.id,
                    &entry.label,
                    &entry.domain,
                    prompt,
                    ActionSpec::entry(&entry.entry_action, description),
                )
                .with_tool_tags(entry.tool_tags.clone()))
            })
            .collect::<Result<Vec<_>, RegistryError>>()?;

        AgentRegistry::new(supervisor, delegates)
    }

    fn resolve_prompt(
        &self,
        agent: &str,
        inline: Option<&str>,
        file: Option<&Path>,
    ) -> Result<String, RegistryError> {
        if let Some(prompt) = inline {
            return Ok(prompt.to_string());
        }
        let file = file.ok_or_else(|| {
            RegistryError::Catalog(format!("agent '{agent}' has neither prompt nor prompt_file"))
        })?;
        let path = match &self.base_dir {
            Some(dir) if file.is_relative() => dir.join(file),
            _ => file.to_path_buf(),
        };
        std::fs::read_to_string(&path)
            .map_err(|e| RegistryError::Catalog(format!("{}: {e}", path.display())))
    }
}

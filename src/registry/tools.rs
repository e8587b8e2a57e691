//! 工具注册表
//!
//! 每个工具属于唯一的 domain 标签和唯一的敏感级别；注册表按 (domain, sensitivity) 建索引，
//! 敏感级别在注册时固定，分类是确定性的查表。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::actions::ActionSpec;
use crate::core::RegistryError;

/// 敏感级别：sensitive 工具执行前必须经过人工确认
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Safe,
    Sensitive,
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sensitivity::Safe => f.write_str("safe"),
            Sensitivity::Sensitive => f.write_str("sensitive"),
        }
    }
}

/// 工具 trait：名称、描述、所属 domain、敏感级别、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 哪一族 Agent 可以使用该工具
    fn domain(&self) -> &str;

    fn sensitivity(&self) -> Sensitivity {
        Sensitivity::Safe
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 把 JSON 参数解析为工具自己的强类型参数
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("Invalid arguments for {tool}: {e}"))
}

/// 工具注册表：名称唯一；按 (domain, sensitivity) 保留注册顺序
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    by_key: HashMap<(String, Sensitivity), Vec<String>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；重名为配置错误
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.by_key
            .entry((tool.domain().to_string(), tool.sensitivity()))
            .or_default()
            .push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn by_domain_and_sensitivity(&self, domain: &str, level: Sensitivity) -> Vec<Arc<dyn Tool>> {
        self.by_key
            .get(&(domain.to_string(), level))
            .map(|names| names.iter().filter_map(|n| self.get(n)).collect())
            .unwrap_or_default()
    }

    /// 某 domain 下全部工具：safe 在前，sensitive 在后
    pub fn by_domain(&self, domain: &str) -> Vec<Arc<dyn Tool>> {
        let mut tools = self.by_domain_and_sensitivity(domain, Sensitivity::Safe);
        tools.extend(self.by_domain_and_sensitivity(domain, Sensitivity::Sensitive));
        tools
    }

    /// 在给定 domain 集合内查某个工具的敏感级别；不在范围内返回 None
    pub fn classify<'a>(
        &self,
        domains: impl IntoIterator<Item = &'a str>,
        name: &str,
    ) -> Option<Sensitivity> {
        let tool = self.tools.get(name)?;
        domains
            .into_iter()
            .any(|d| d == tool.domain())
            .then(|| tool.sensitivity())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 某 domain 下工具对应的 ActionSpec 列表，供模型绑定
    pub fn action_specs(&self, domain: &str) -> Vec<ActionSpec> {
        self.by_domain(domain)
            .iter()
            .map(|tool| ActionSpec::new(tool.name(), tool.description(), tool.parameters_schema()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubTool {
        name: &'static str,
        domain: &'static str,
        sensitivity: Sensitivity,
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "stub"
        }

        fn domain(&self) -> &str {
            self.domain
        }

        fn sensitivity(&self) -> Sensitivity {
            self.sensitivity
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            Ok(self.name.to_string())
        }
    }

    fn stub(name: &'static str, domain: &'static str, sensitivity: Sensitivity) -> StubTool {
        StubTool { name, domain, sensitivity }
    }

    fn sample() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(stub("get_order_status", "orders", Sensitivity::Safe)).unwrap();
        registry.register(stub("cancel_order", "orders", Sensitivity::Sensitive)).unwrap();
        registry.register(stub("faq_lookup", "kb", Sensitivity::Safe)).unwrap();
        registry
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = sample();
        let err = registry
            .register(stub("cancel_order", "kb", Sensitivity::Safe))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateTool("cancel_order".into()));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_lookup_by_domain_and_sensitivity() {
        let registry = sample();
        let sensitive = registry.by_domain_and_sensitivity("orders", Sensitivity::Sensitive);
        assert_eq!(sensitive.len(), 1);
        assert_eq!(sensitive[0].name(), "cancel_order");

        let names: Vec<_> = registry.by_domain("orders").iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, ["get_order_status", "cancel_order"]);
        assert!(registry.by_domain("nothing").is_empty());
    }

    #[test]
    fn test_classify_is_scoped_to_domain() {
        let registry = sample();
        assert_eq!(registry.classify(["orders"], "cancel_order"), Some(Sensitivity::Sensitive));
        assert_eq!(registry.classify(["orders"], "get_order_status"), Some(Sensitivity::Safe));
        assert_eq!(registry.classify(["orders"], "faq_lookup"), None);
        assert_eq!(registry.classify(["orders"], "missing"), None);
    }

    #[test]
    fn test_parse_args_reports_tool() {
        #[derive(Deserialize)]
        struct Args {
            #[allow(dead_code)]
            order_id: String,
        }
        let err = parse_args::<Args>("cancel_order", serde_json::json!({})).err().unwrap();
        assert!(err.contains("cancel_order"));
    }
}

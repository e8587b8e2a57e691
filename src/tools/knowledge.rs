//! 知识库工具族（domain = knowledge_base）
//!
//! faq_lookup 为 safe；private_info_lookup 读取内部私密记录，为 sensitive。
//! 检索为关键词重叠打分，足够演示路由，不追求检索质量。

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::registry::{parse_args, Sensitivity, Tool};

pub const DOMAIN: &str = "knowledge_base";

const DEFAULT_FAQ: &[&str] = &[
    "We understand that there are occasions when orders will need to be canceled. \
     Once an order has been placed, buyers have the option to request an order cancellation up until the order has shipped.",
    "Refunds are issued to the original payment method within 5 to 10 business days after the returned item is received.",
    "Standard delivery takes 3 to 5 business days. Express delivery arrives the next business day.",
];

#[derive(Debug, Deserialize)]
struct QueryArgs {
    query: String,
}

fn query_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {"type": "string", "description": "What to search for"}
        },
        "required": ["query"]
    })
}

/// 切分为小写词集合，用于简单相似度（词重叠数）
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 2)
        .collect()
}

/// 内存知识库：公开 FAQ 与内部私密记录
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    faq: Vec<String>,
    private: Vec<String>,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self {
            faq: DEFAULT_FAQ.iter().map(|s| s.to_string()).collect(),
            private: Vec::new(),
        }
    }
}

impl KnowledgeBase {
    pub fn new(faq: Vec<String>, private: Vec<String>) -> Self {
        Self { faq, private }
    }

    pub fn with_private_record(mut self, record: impl Into<String>) -> Self {
        self.private.push(record.into());
        self
    }

    fn best_match<'a>(entries: &'a [String], query: &str) -> Option<&'a str> {
        let q = tokenize_lower(query);
        entries
            .iter()
            .map(|e| (tokenize_lower(e).intersection(&q).count(), e))
            .filter(|(score, _)| *score > 0)
            .max_by_key(|(score, _)| *score)
            .map(|(_, e)| e.as_str())
    }

    pub fn search_faq(&self, query: &str) -> Option<&str> {
        Self::best_match(&self.faq, query)
    }

    pub fn search_private(&self, query: &str) -> Option<&str> {
        Self::best_match(&self.private, query)
    }
}

pub struct FaqLookupTool {
    kb: Arc<KnowledgeBase>,
}

impl FaqLookupTool {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Tool for FaqLookupTool {
    fn name(&self) -> &str {
        "faq_lookup"
    }

    fn description(&self) -> &str {
        "Search the internal FAQ knowledge base."
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn parameters_schema(&self) -> Value {
        query_schema()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: QueryArgs = parse_args(self.name(), args)?;
        Ok(match self.kb.search_faq(&args.query) {
            Some(hit) => format!("FAQ result for '{}': {hit}", args.query),
            None => format!("No FAQ entry matches '{}'.", args.query),
        })
    }
}

pub struct PrivateInfoLookupTool {
    kb: Arc<KnowledgeBase>,
}

impl PrivateInfoLookupTool {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Tool for PrivateInfoLookupTool {
    fn name(&self) -> &str {
        "private_info_lookup"
    }

    fn description(&self) -> &str {
        "Search private data from the internal knowledge base."
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn sensitivity(&self) -> Sensitivity {
        Sensitivity::Sensitive
    }

    fn parameters_schema(&self) -> Value {
        query_schema()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: QueryArgs = parse_args(self.name(), args)?;
        Ok(match self.kb.search_private(&args.query) {
            Some(hit) => format!("Private record for '{}': {hit}", args.query),
            None => format!("No private record matches '{}'.", args.query),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_faq_lookup_matches_keywords() {
        let tool = FaqLookupTool::new(Arc::new(KnowledgeBase::default()));
        let reply = tool.execute(json!({"query": "can I cancel my order"})).await.unwrap();
        assert!(reply.contains("order cancellation"));
        let miss = tool.execute(json!({"query": "zzz"})).await.unwrap();
        assert!(miss.starts_with("No FAQ entry"));
    }

    #[tokio::test]
    async fn test_private_lookup_is_sensitive() {
        let kb = Arc::new(KnowledgeBase::default().with_private_record("Account owner: Emily Johnson, tier gold"));
        let tool = PrivateInfoLookupTool::new(kb);
        assert_eq!(tool.sensitivity(), Sensitivity::Sensitive);
        let reply = tool.execute(json!({"query": "emily account"})).await.unwrap();
        assert!(reply.contains("tier gold"));
    }
}

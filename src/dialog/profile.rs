//! 用户 Profile 与拉取协作者
//!
//! Profile 是不透明的键值 blob：新会话首次路由前拉取一次，之后 Agent 只读。

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 哨兵值，拉取失败时使用
pub const UNKNOWN: &str = "unknown";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(BTreeMap<String, Value>);

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// 哨兵 Profile：id / name / email 均为 "unknown"
    pub fn unknown() -> Self {
        Self::new()
            .with("id", UNKNOWN)
            .with("name", UNKNOWN)
            .with("email", UNKNOWN)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_unknown(&self) -> bool {
        self.get("id").and_then(Value::as_str) == Some(UNKNOWN)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 供 prompt 模板中的 {user_profile} 占位符使用
    pub fn render(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Profile 拉取协作者：thread_id -> Profile
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn fetch(&self, thread_id: &str) -> Result<Profile, String>;
}

/// 静态表实现：按 thread_id 查表，查不到时用 fallback，两者都没有则报错
#[derive(Debug, Default, Clone)]
pub struct StaticProfileProvider {
    profiles: HashMap<String, Profile>,
    fallback: Option<Profile>,
}

impl StaticProfileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>, profile: Profile) -> Self {
        self.profiles.insert(thread_id.into(), profile);
        self
    }

    pub fn with_fallback(mut self, profile: Profile) -> Self {
        self.fallback = Some(profile);
        self
    }
}

#[async_trait]
impl ProfileProvider for StaticProfileProvider {
    async fn fetch(&self, thread_id: &str) -> Result<Profile, String> {
        self.profiles
            .get(thread_id)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| format!("No profile registered for thread {thread_id}"))
    }
}

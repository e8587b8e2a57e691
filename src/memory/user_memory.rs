//! 用户隔离的长期记忆
//!
//! 以 user_id（不是 thread_id）为键保存 Profile 事实，跨会话复用。
//! 同一用户的读写互斥，不同用户互不阻塞；配置 snapshot_dir 时每用户一个 JSON 快照文件。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::dialog::Profile;

/// 用户记忆配置
#[derive(Debug, Clone, Default)]
pub struct UserMemoryConfig {
    /// 快照存储目录（每用户一个文件）
    pub snapshot_dir: Option<PathBuf>,
}

/// 单个用户的记忆空间
#[derive(Debug)]
pub struct UserFacts {
    profile: Option<Profile>,
    snapshot_path: Option<PathBuf>,
}

impl UserFacts {
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// 覆盖记忆并写快照；快照失败只记日志
    pub async fn remember(&mut self, profile: Profile) {
        if let Some(path) = &self.snapshot_path {
            match serde_json::to_vec_pretty(&profile) {
                Ok(bytes) => {
                    if let Err(e) = tokio::fs::write(path, bytes).await {
                        tracing::warn!(path = %path.display(), error = %e, "failed to write user snapshot");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to serialize user snapshot"),
            }
        }
        self.profile = Some(profile);
    }

    async fn load(snapshot_path: Option<PathBuf>) -> Self {
        let mut profile = None;
        if let Some(path) = &snapshot_path {
            if let Ok(bytes) = tokio::fs::read(path).await {
                match serde_json::from_slice::<Profile>(&bytes) {
                    Ok(p) => profile = Some(p),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt user snapshot")
                    }
                }
            }
        }
        Self {
            profile,
            snapshot_path,
        }
    }
}

/// 用户隔离的记忆管理器
pub struct UserMemoryManager {
    config: UserMemoryConfig,
    /// user_id -> 记忆空间
    memories: RwLock<HashMap<String, Arc<Mutex<UserFacts>>>>,
}

impl UserMemoryManager {
    pub fn new(config: UserMemoryConfig) -> Self {
        if let Some(dir) = &config.snapshot_dir {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to create snapshot dir");
            }
        }
        Self {
            config,
            memories: RwLock::new(HashMap::new()),
        }
    }

    /// 获取或创建用户的记忆空间（首次访问时从快照加载）
    pub async fn get_or_create(&self, user_id: &str) -> Arc<Mutex<UserFacts>> {
        {
            let memories = self.memories.read().await;
            if let Some(memory) = memories.get(user_id) {
                return Arc::clone(memory);
            }
        }

        let mut memories = self.memories.write().await;
        if let Some(memory) = memories.get(user_id) {
            return Arc::clone(memory);
        }

        let snapshot_path = self
            .config
            .snapshot_dir
            .as_ref()
            .map(|dir| dir.join(format!("user_{}_profile.json", sanitize_user_id(user_id))));
        let memory = Arc::new(Mutex::new(UserFacts::load(snapshot_path).await));
        memories.insert(user_id.to_string(), Arc::clone(&memory));
        memory
    }

    /// 读取用户记住的 Profile
    pub async fn recall(&self, user_id: &str) -> Option<Profile> {
        let memory = self.get_or_create(user_id).await;
        let facts = memory.lock().await;
        facts.profile().cloned()
    }

    pub async fn remember(&self, user_id: &str, profile: Profile) {
        let memory = self.get_or_create(user_id).await;
        memory.lock().await.remember(profile).await;
    }

    /// 获取活跃用户数
    pub async fn active_users(&self) -> usize {
        self.memories.read().await.len()
    }

    /// 清理指定用户的记忆（不删除快照文件）
    pub async fn clear_user(&self, user_id: &str) -> bool {
        self.memories.write().await.remove(user_id).is_some()
    }

    pub async fn list_users(&self) -> Vec<String> {
        self.memories.read().await.keys().cloned().collect()
    }
}

/// 清理 user_id 中的特殊字符用于文件名
fn sanitize_user_id(user_id: &str) -> String {
    user_id
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

//! Checkpoint 存储
//!
//! 以 thread_id 为键保存 DialogState、挂起标记、下一节点与 resolved 标志。
//! 引擎在每个步骤边界整体写回；同一 thread 的读改写由引擎的会话锁串行化。
//! 提供内存实现与 SQLite 实现（sqlite feature，跨进程重启可恢复）。

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::CheckpointError;
use crate::dialog::{ActionRequest, DialogState};
use crate::workflow::NodeId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub state: DialogState,
    /// 等待确认的敏感工具节点
    #[serde(default)]
    pub pending_suspension: Option<NodeId>,
    /// 崩溃恢复：下一个要执行的节点（本轮已结束时为 None）
    #[serde(default)]
    pub next: Option<NodeId>,
    /// 本轮是否已完整结束
    #[serde(default)]
    pub resolved: bool,
    /// 本 thread 已提交的步骤数（单调递增）
    #[serde(default)]
    pub step: u64,
    /// RFC 3339
    pub updated_at: String,
}

impl Checkpoint {
    pub fn new(thread_id: impl Into<String>, state: DialogState) -> Self {
        Self {
            thread_id: thread_id.into(),
            state,
            pending_suspension: None,
            next: None,
            resolved: true,
            step: 0,
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.pending_suspension.is_some()
    }

    /// 挂起时等待确认的动作请求
    pub fn pending_action(&self) -> Option<&ActionRequest> {
        self.pending_suspension.as_ref()?;
        self.state.last_agent_output().and_then(|m| m.first_action())
    }

    pub(crate) fn touch(&mut self) {
        self.step += 1;
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// Checkpoint 存储接口
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    /// 整体覆盖写入（原子）
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// 删除会话（供外部协作者使用，引擎自身从不调用）
    async fn delete(&self, thread_id: &str) -> Result<bool, CheckpointError>;

    async fn thread_ids(&self) -> Result<Vec<String>, CheckpointError>;
}

/// 内存存储：适合短生命周期部署与测试
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    entries: RwLock<HashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.entries.read().await.get(thread_id).cloned())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.entries
            .write()
            .await
            .insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, CheckpointError> {
        Ok(self.entries.write().await.remove(thread_id).is_some())
    }

    async fn thread_ids(&self) -> Result<Vec<String>, CheckpointError> {
        let mut ids: Vec<String> = self.entries.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCheckpointStore;

#[cfg(feature = "sqlite")]
mod sqlite {
    use std::path::Path;

    use async_trait::async_trait;
    use sqlx::Row;

    use super::{Checkpoint, CheckpointStore};
    use crate::core::CheckpointError;

    fn storage(e: sqlx::Error) -> CheckpointError {
        CheckpointError::Storage(e.to_string())
    }

    /// SQLite 存储：每个 thread 一行，Checkpoint 以 JSON 文档保存
    pub struct SqliteCheckpointStore {
        pool: sqlx::sqlite::SqlitePool,
    }

    impl SqliteCheckpointStore {
        pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
            let db_url = format!("sqlite:{}?mode=rwc", db_path.as_ref().display());
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(5)
                .connect(&db_url)
                .await
                .map_err(storage)?;
            let store = Self { pool };
            store.init_tables().await?;
            Ok(store)
        }

        async fn init_tables(&self) -> Result<(), CheckpointError> {
            sqlx::query(
                "CREATE TABLE IF NOT EXISTS checkpoints (
                    thread_id TEXT PRIMARY KEY,
                    payload TEXT NOT NULL,
                    pending TEXT,
                    resolved INTEGER NOT NULL,
                    step INTEGER NOT NULL,
                    updated_at TEXT NOT NULL
                )",
            )
            .execute(&self.pool)
            .await
            .map_err(storage)?;
            Ok(())
        }
    }

    #[async_trait]
    impl CheckpointStore for SqliteCheckpointStore {
        async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
            let row = sqlx::query("SELECT payload FROM checkpoints WHERE thread_id = ?")
                .bind(thread_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;
            match row {
                Some(row) => {
                    let payload: String = row.get("payload");
                    Ok(Some(serde_json::from_str(&payload)?))
                }
                None => Ok(None),
            }
        }

        async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
            let payload = serde_json::to_string(checkpoint)?;
            sqlx::query(
                "INSERT INTO checkpoints (thread_id, payload, pending, resolved, step, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(thread_id) DO UPDATE SET
                    payload = excluded.payload,
                    pending = excluded.pending,
                    resolved = excluded.resolved,
                    step = excluded.step,
                    updated_at = excluded.updated_at",
            )
            .bind(&checkpoint.thread_id)
            .bind(&payload)
            .bind(checkpoint.pending_suspension.as_ref().map(|n| n.to_string()))
            .bind(checkpoint.resolved)
            .bind(checkpoint.step as i64)
            .bind(&checkpoint.updated_at)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
            Ok(())
        }

        async fn delete(&self, thread_id: &str) -> Result<bool, CheckpointError> {
            let result = sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?")
                .bind(thread_id)
                .execute(&self.pool)
                .await
                .map_err(storage)?;
            Ok(result.rows_affected() > 0)
        }

        async fn thread_ids(&self) -> Result<Vec<String>, CheckpointError> {
            let rows = sqlx::query("SELECT thread_id FROM checkpoints ORDER BY thread_id")
                .fetch_all(&self.pool)
                .await
                .map_err(storage)?;
            Ok(rows.iter().map(|row| row.get::<String, _>("thread_id")).collect())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::dialog::{ActionRequest, DialogState, Message, Profile};
        use crate::workflow::NodeId;
        use serde_json::json;

        fn suspended_checkpoint() -> Checkpoint {
            let mut state = DialogState::new(Profile::new().with("name", "Ada"));
            state.push_owner("order_management");
            state.push_message(Message::user("cancel order 42"));
            state.push_message(Message::assistant_with_action(
                "",
                ActionRequest::new("cancel_order", json!({"order_id": "42"})),
            ));
            let mut cp = Checkpoint::new("t1", state);
            cp.pending_suspension = Some(NodeId::SensitiveTools("order_management".into()));
            cp.next = cp.pending_suspension.clone();
            cp.resolved = false;
            cp
        }

        #[tokio::test]
        async fn test_round_trip_survives_reopen() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("checkpoints.db");
            let cp = suspended_checkpoint();
            {
                let store = SqliteCheckpointStore::open(&path).await.unwrap();
                store.save(&cp).await.unwrap();
            }
            let store = SqliteCheckpointStore::open(&path).await.unwrap();
            let loaded = store.load("t1").await.unwrap().unwrap();
            assert_eq!(loaded, cp);
            assert_eq!(loaded.pending_action().unwrap().name, "cancel_order");
            assert_eq!(store.thread_ids().await.unwrap(), vec!["t1".to_string()]);
        }

        #[tokio::test]
        async fn test_upsert_and_delete() {
            let dir = tempfile::tempdir().unwrap();
            let store = SqliteCheckpointStore::open(dir.path().join("c.db")).await.unwrap();
            let mut cp = suspended_checkpoint();
            store.save(&cp).await.unwrap();
            cp.pending_suspension = None;
            cp.resolved = true;
            cp.touch();
            store.save(&cp).await.unwrap();
            let loaded = store.load("t1").await.unwrap().unwrap();
            assert!(loaded.resolved);
            assert_eq!(loaded.step, 1);

            assert!(store.delete("t1").await.unwrap());
            assert!(!store.delete("t1").await.unwrap());
            assert!(store.load("t1").await.unwrap().is_none());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::{Message, Profile};

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.load("t").await.unwrap().is_none());

        let mut state = DialogState::new(Profile::unknown());
        state.push_owner("knowledge_base");
        state.push_message(Message::user("refund policy?"));
        let cp = Checkpoint::new("t", state);
        store.save(&cp).await.unwrap();

        let loaded = store.load("t").await.unwrap().unwrap();
        assert_eq!(loaded.state.messages(), cp.state.messages());
        assert_eq!(loaded.state.ownership_stack(), cp.state.ownership_stack());
        assert!(loaded.pending_action().is_none());

        assert!(store.delete("t").await.unwrap());
        assert!(store.thread_ids().await.unwrap().is_empty());
    }

    #[test]
    fn test_checkpoint_json_shape() {
        let mut cp = Checkpoint::new("t", DialogState::default());
        cp.pending_suspension = Some(NodeId::SensitiveTools("order_management".into()));
        let value = serde_json::to_value(&cp).unwrap();
        assert_eq!(value["pending_suspension"], "sensitive_tools_order_management");
        assert_eq!(value["resolved"], true);
    }
}

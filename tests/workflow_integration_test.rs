//! 工作流集成测试：按配置构建引擎，覆盖确认/拒绝、入口路由回退、跨重启恢复、同会话串行与 Profile 回退

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use switchboard::config::AppConfig;
use switchboard::core::EngineBuilder;
use switchboard::dialog::{DialogState, Message, Profile, Role, StaticProfileProvider};
use switchboard::llm::{CompletionRequest, LlmClient, ScriptedLlmClient};
use switchboard::tools::{OrderBook, ToolBackends};
use switchboard::workflow::{
    Checkpoint, CheckpointStore, InMemoryCheckpointStore, NodeId, TurnInput, TurnRequest,
    TurnStatus, WorkflowEngine,
};

fn backends_with(orders: Arc<OrderBook>) -> ToolBackends {
    ToolBackends {
        orders,
        ..ToolBackends::default()
    }
}

fn cancel_script() -> Vec<Message> {
    vec![
        ScriptedLlmClient::action(
            "ToOrderManagementAssistant",
            json!({"request": "The user wants to cancel order 42."}),
        ),
        ScriptedLlmClient::action("cancel_order", json!({"order_id": "42"})),
    ]
}

async fn engine_with(
    llm: Arc<ScriptedLlmClient>,
    orders: Arc<OrderBook>,
    store: Arc<InMemoryCheckpointStore>,
) -> WorkflowEngine {
    EngineBuilder::new(AppConfig::default())
        .with_llm(llm)
        .with_store(store)
        .with_backends(backends_with(orders))
        .build()
        .await
        .unwrap()
}

async fn suspend_on_cancel(engine: &WorkflowEngine) {
    let out = engine
        .run_turn(TurnRequest::text("1", "u1", "Please cancel order 42"))
        .await
        .unwrap();
    match &out.status {
        TurnStatus::Suspended { node, action } => {
            assert_eq!(*node, NodeId::SensitiveTools("order_management".into()));
            assert_eq!(action.name, "cancel_order");
        }
        other => panic!("expected suspension, got {other:?}"),
    }
    assert_eq!(
        out.state.ownership_stack().as_slice(),
        ["order_management".to_string()]
    );
}

#[tokio::test]
async fn test_cancel_order_approved_runs_tool_once_and_returns_to_supervisor() {
    let llm = Arc::new(ScriptedLlmClient::new(cancel_script()));
    let orders = Arc::new(OrderBook::new());
    let store = Arc::new(InMemoryCheckpointStore::new());
    let engine = engine_with(llm.clone(), orders.clone(), store.clone()).await;

    suspend_on_cancel(&engine).await;
    assert!(!orders.is_cancelled("42"));
    let cp = store.load("1").await.unwrap().unwrap();
    assert!(cp.is_suspended());
    assert!(!cp.resolved);

    llm.push(ScriptedLlmClient::complete_or_escalate("completed"));
    let out = engine
        .run_turn(TurnRequest::new("1", "u1", TurnInput::Approve))
        .await
        .unwrap();
    assert_eq!(out.status, TurnStatus::Terminated);
    assert!(orders.is_cancelled("42"));
    assert!(out.state.ownership_stack().is_empty());
    let tool_replies: Vec<_> = out
        .state
        .messages()
        .iter()
        .filter(|m| m.role == Role::Tool && m.content.contains("cancelled successfully"))
        .collect();
    assert_eq!(tool_replies.len(), 1);

    // 同一确认不能重复使用
    let err = engine
        .run_turn(TurnRequest::new("1", "u1", TurnInput::Approve))
        .await
        .unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(llm.remaining(), 0);
}

#[tokio::test]
async fn test_rejection_keeps_order_and_returns_control_to_owner() {
    let llm = Arc::new(ScriptedLlmClient::new(cancel_script()));
    let orders = Arc::new(OrderBook::new());
    let store = Arc::new(InMemoryCheckpointStore::new());
    let engine = engine_with(llm.clone(), orders.clone(), store).await;

    suspend_on_cancel(&engine).await;
    llm.push(Message::assistant("Understood, order 42 stays active."));
    let out = engine
        .run_turn(TurnRequest::new(
            "1",
            "u1",
            TurnInput::Reject {
                reason: Some("I changed my mind".into()),
            },
        ))
        .await
        .unwrap();
    assert_eq!(out.status, TurnStatus::Terminated);
    assert!(!orders.is_cancelled("42"));
    assert_eq!(
        out.state.ownership_stack().as_slice(),
        ["order_management".to_string()]
    );
    assert!(out
        .state
        .messages()
        .iter()
        .any(|m| m.role == Role::Tool && m.content.contains("I changed my mind")));
    assert_eq!(out.last_reply(), Some("Understood, order 42 stays active."));

    // 拒绝后由订单 Agent 继续处理，不经过 supervisor
    let last_call = llm.calls().pop().unwrap();
    assert!(last_call.actions.iter().any(|a| a == "cancel_order"));
}

#[tokio::test]
async fn test_new_text_while_suspended_counts_as_rejection() {
    let llm = Arc::new(ScriptedLlmClient::new(cancel_script()));
    let orders = Arc::new(OrderBook::new());
    let store = Arc::new(InMemoryCheckpointStore::new());
    let engine = engine_with(llm.clone(), orders.clone(), store).await;

    suspend_on_cancel(&engine).await;
    llm.push(Message::assistant("Sure, which order should I cancel instead?"));
    let out = engine
        .run_turn(TurnRequest::text("1", "u1", "wrong order, I meant 43"))
        .await
        .unwrap();
    assert!(!out.is_suspended());
    assert!(!orders.is_cancelled("42"));
    assert!(out
        .state
        .messages()
        .iter()
        .any(|m| m.role == Role::Tool && m.content.contains("Reasoning: 'wrong order, I meant 43'")));
}

#[tokio::test]
async fn test_unknown_stack_top_falls_back_to_supervisor() {
    let llm = Arc::new(ScriptedLlmClient::new(vec![Message::assistant("Hi, how can I help?")]));
    let store = Arc::new(InMemoryCheckpointStore::new());
    let mut state = DialogState::new(Profile::unknown());
    state.push_owner("retired_agent");
    store.save(&Checkpoint::new("legacy", state)).await.unwrap();

    let engine = engine_with(llm.clone(), Arc::new(OrderBook::new()), store).await;
    let out = engine
        .run_turn(TurnRequest::text("legacy", "u1", "hello"))
        .await
        .unwrap();
    assert_eq!(out.last_reply(), Some("Hi, how can I help?"));
    let calls = llm.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].actions.iter().any(|a| a == "ToOrderManagementAssistant"));
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_suspension_survives_engine_restart_with_sqlite() {
    use switchboard::config::CheckpointBackend;

    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.checkpoint.backend = CheckpointBackend::Sqlite;
    config.checkpoint.sqlite_path = dir.path().join("checkpoints.db");
    let orders = Arc::new(OrderBook::new());

    {
        let engine = EngineBuilder::new(config.clone())
            .with_llm(Arc::new(ScriptedLlmClient::new(cancel_script())))
            .with_backends(backends_with(orders.clone()))
            .build()
            .await
            .unwrap();
        suspend_on_cancel(&engine).await;
    }

    let llm = Arc::new(ScriptedLlmClient::new(vec![
        ScriptedLlmClient::complete_or_escalate("completed"),
    ]));
    let engine = EngineBuilder::new(config)
        .with_llm(llm.clone())
        .with_backends(backends_with(orders.clone()))
        .build()
        .await
        .unwrap();
    let cp = engine.checkpoint("1").await.unwrap().unwrap();
    assert_eq!(cp.pending_action().map(|a| a.name.as_str()), Some("cancel_order"));

    let out = engine
        .run_turn(TurnRequest::new("1", "u1", TurnInput::Approve))
        .await
        .unwrap();
    assert_eq!(out.status, TurnStatus::Terminated);
    assert!(orders.is_cancelled("42"));
    assert_eq!(llm.calls().len(), 1);
}

/// 每次调用都稍作等待，放大并发交错
struct SlowEcho;

#[async_trait]
impl LlmClient for SlowEcho {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Message, String> {
        tokio::time::sleep(Duration::from_millis(30)).await;
        let last = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(Message::assistant(format!("echo: {last}")))
    }
}

#[tokio::test]
async fn test_turns_on_same_thread_are_serialized() {
    let engine = Arc::new(
        EngineBuilder::new(AppConfig::default())
            .with_llm(Arc::new(SlowEcho))
            .build()
            .await
            .unwrap(),
    );

    let mut handles = Vec::new();
    for i in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .run_turn(TurnRequest::text("shared", "u1", format!("message {i}")))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let cp = engine.checkpoint("shared").await.unwrap().unwrap();
    let messages = cp.state.messages();
    assert_eq!(messages.len(), 8);
    for pair in messages.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].content, format!("echo: {}", pair[0].content));
    }
}

#[tokio::test]
async fn test_profile_fetched_once_and_recalled_for_same_user() {
    let provider = StaticProfileProvider::new().with_thread(
        "a",
        Profile::new()
            .with("id", "u1")
            .with("name", "Ada")
            .with("email", "ada@example.com"),
    );
    let llm = Arc::new(ScriptedLlmClient::new(vec![
        Message::assistant("Hi Ada"),
        Message::assistant("Hi again"),
    ]));
    let engine = EngineBuilder::new(AppConfig::default())
        .with_llm(llm.clone())
        .with_profiles(Arc::new(provider))
        .build()
        .await
        .unwrap();

    engine.run_turn(TurnRequest::text("a", "u1", "hello")).await.unwrap();
    // thread b 拉不到 Profile，回退到 u1 已记住的事实
    let out = engine.run_turn(TurnRequest::text("b", "u1", "hello")).await.unwrap();
    assert_eq!(out.state.profile().get("name"), Some(&json!("Ada")));
    assert!(llm.calls()[1].system.contains("ada@example.com"));
    assert!(engine.memory().recall("u1").await.is_some());
}

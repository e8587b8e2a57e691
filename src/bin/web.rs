//! Switchboard HTTP 接口
//!
//! 启动: cargo run --bin switchboard-web --features web
//! POST /api/threads/:thread_id/turns  {"user_id": "...", "text": "...", "confirmation": "accepted" | "rejected"}

#![cfg(feature = "web")]

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use switchboard::core::{create_engine_builder, TurnError};
use switchboard::workflow::{Checkpoint, TurnOutcome, TurnRequest, WorkflowEngine};

struct AppState {
    engine: WorkflowEngine,
}

#[derive(Debug, Deserialize)]
struct TurnBody {
    user_id: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    confirmation: Option<String>,
}

type ApiError = (StatusCode, String);

fn map_turn_error(e: TurnError) -> ApiError {
    if e.is_client_error() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else {
        tracing::error!(error = %e, "turn failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

async fn api_turn(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Json(body): Json<TurnBody>,
) -> Result<Json<TurnOutcome>, ApiError> {
    let request = TurnRequest::from_parts(
        thread_id,
        body.user_id,
        body.text,
        body.confirmation.as_deref(),
    )
    .map_err(map_turn_error)?;
    let outcome = state.engine.run_turn(request).await.map_err(map_turn_error)?;
    Ok(Json(outcome))
}

async fn api_thread(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<Json<Checkpoint>, ApiError> {
    match state.engine.checkpoint(&thread_id).await.map_err(map_turn_error)? {
        Some(cp) => Ok(Json(cp)),
        None => Err((StatusCode::NOT_FOUND, format!("thread {thread_id} not found"))),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    switchboard::observability::init();

    let builder = create_engine_builder(None);
    let port = std::env::var("SWITCHBOARD_WEB_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(builder.config().web.port);
    let engine = builder.build().await?;
    let state = Arc::new(AppState { engine });

    let app = Router::new()
        .route("/api/threads/:thread_id/turns", post(api_turn))
        .route("/api/threads/:thread_id", get(api_thread))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(Arc::clone(&state));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Switchboard API: http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

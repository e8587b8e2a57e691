//! 可观测性：tracing 订阅者初始化
//!
//! 默认级别 info，可用 RUST_LOG 覆盖（如 `RUST_LOG=switchboard=debug`）。重复初始化会被忽略。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    init_with_default("info");
}

pub fn init_with_default(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
    if result.is_err() {
        tracing::debug!("tracing subscriber already initialised");
    }
}

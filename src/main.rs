//! Switchboard 命令行
//!
//! 入口：初始化日志、按配置构建工作流引擎，在终端里以单个 thread 进行多轮对话。
//! 用法：switchboard [--thread ID] [--user ID] [--config PATH]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use switchboard::core::create_engine_builder;
use switchboard::dialog::{Profile, StaticProfileProvider};
use switchboard::workflow::{TurnInput, TurnOutcome, TurnRequest, WorkflowEngine};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const APPROVAL_PROMPT: &str =
    "Do you approve of the above actions? Type 'y' to continue; otherwise, explain your requested changes.";

/// Switchboard 命令行：以单个 thread 与多 Agent 工作流对话
#[derive(Parser, Debug)]
#[command(name = "switchboard", version, about = "Multi-agent dialog orchestration REPL")]
struct Cli {
    /// 会话（thread）标识
    #[arg(long, default_value = "1")]
    thread: String,

    /// 用户标识
    #[arg(long, default_value = "local")]
    user: String,

    /// 额外的配置文件，覆盖 config/default.toml
    #[arg(long)]
    config: Option<PathBuf>,
}

fn print_outcome(outcome: &TurnOutcome) {
    if let Some(reply) = outcome.last_reply() {
        println!("assistant> {reply}");
    }
    if let Some(action) = outcome.pending_action() {
        println!(
            "Pending sensitive action: {} {}",
            action.name, action.args
        );
        println!("{APPROVAL_PROMPT}");
    }
}

async fn run_turn(engine: &WorkflowEngine, request: TurnRequest) -> Option<TurnOutcome> {
    match engine.run_turn(request).await {
        Ok(outcome) => {
            print_outcome(&outcome);
            Some(outcome)
        }
        Err(e) => {
            eprintln!("error: {e}");
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    switchboard::observability::init_with_default("warn");

    let args = Cli::parse();
    let profile = Profile::new()
        .with("id", args.user.clone())
        .with("name", args.user.clone())
        .with("email", "unknown");
    let engine = create_engine_builder(args.config)
        .with_profiles(Arc::new(StaticProfileProvider::new().with_fallback(profile)))
        .build()
        .await
        .context("Failed to build workflow engine")?;

    // 上次退出时若停在确认点，先把待确认动作展示出来
    let mut suspended = match engine.checkpoint(&args.thread).await? {
        Some(cp) if cp.is_suspended() => {
            if let Some(action) = cp.pending_action() {
                println!("Thread {} is waiting on: {} {}", args.thread, action.name, action.args);
                println!("{APPROVAL_PROMPT}");
            }
            true
        }
        _ => false,
    };

    println!("switchboard thread={} user={} (type 'exit' to quit)", args.thread, args.user);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"user> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line == "exit" || line == "quit" {
            break;
        }

        let input = if suspended {
            if line.eq_ignore_ascii_case("y") {
                TurnInput::Approve
            } else {
                TurnInput::Reject {
                    reason: Some(line.to_string()).filter(|l| !l.is_empty()),
                }
            }
        } else if line.is_empty() {
            continue;
        } else {
            TurnInput::Text(line.to_string())
        };

        let request = TurnRequest::new(args.thread.clone(), args.user.clone(), input);
        if let Some(outcome) = run_turn(&engine, request).await {
            suspended = outcome.is_suspended();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["switchboard"]).unwrap();
        assert_eq!(cli.thread, "1");
        assert_eq!(cli.user, "local");
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "switchboard",
            "--thread",
            "7",
            "--user",
            "3442 587242",
            "--config",
            "config/dev.toml",
        ])
        .unwrap();
        assert_eq!(cli.thread, "7");
        assert_eq!(cli.user, "3442 587242");
        assert_eq!(cli.config, Some(PathBuf::from("config/dev.toml")));
    }

    #[test]
    fn test_cli_rejects_unknown_flag() {
        assert!(Cli::try_parse_from(["switchboard", "--threads", "7"]).is_err());
        assert!(Cli::try_parse_from(["switchboard", "--thread"]).is_err());
    }
}

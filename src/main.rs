//! Routing Planner 命令行入口
//!
//! 用法：routing-planner "<请求>" [--config path/to/config.toml]
//! 有 API Key 时通过 OpenAI 兼容端点生成计划并执行；否则使用离线脚本演示完整流程。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use routing_planner::config::{load_config, AppConfig};
use routing_planner::dialog::{Agent, RoleDialog};
use routing_planner::llm::{LlmClient, MockLlmClient, OpenAiClient, ScriptedLlmClient};
use routing_planner::observability;
use routing_planner::planning::{LlmPlanGenerator, TwoStagePlanner};
use routing_planner::routing::{LlmExecutor, RoutingContext, RoutingLoop};
use tokio_util::sync::CancellationToken;

const ROUTER_INSTRUCTION: &str =
    "You are a routing planner. Decompose the user's request into tasks for the SQL Driver agent.";

/// 离线演示用的计划回复：一个单步任务 + 一个两步任务
const OFFLINE_PLANS: [&str; 2] = [
    r#"[{"task": "List the tables that hold order data", "is_multiple_steps": false, "tables": ["orders"]},
        {"task": "Summarise monthly revenue", "is_multiple_steps": true, "tables": ["orders", "payments"]}]"#,
    r#"[{"description": "Join orders with payments", "tables": ["orders", "payments"]},
        {"description": "Group revenue by month", "tables": ["orders"], "results": "month, revenue"}]"#,
];

fn parse_args() -> (String, Option<PathBuf>) {
    let mut request = None;
    let mut config_path = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            config_path = args.next().map(PathBuf::from);
        } else if request.is_none() {
            request = Some(arg);
        }
    }
    (
        request.unwrap_or_else(|| "Report monthly revenue from the orders database".to_string()),
        config_path,
    )
}

/// 返回 (计划生成用 LLM, 执行用 LLM)
fn create_llms(cfg: &AppConfig) -> (Arc<dyn LlmClient>, Arc<dyn LlmClient>) {
    let api_key = cfg.llm.resolved_api_key();
    if cfg.llm.provider.eq_ignore_ascii_case("openai") && api_key.is_some() {
        tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            &cfg.llm.model,
            api_key.as_deref(),
        ));
        (llm.clone(), llm)
    } else {
        tracing::warn!("No API key set or provider is mock, using offline scripted plans");
        (
            Arc::new(ScriptedLlmClient::new(OFFLINE_PLANS)),
            Arc::new(MockLlmClient),
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let (request, config_path) = parse_args();
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let (planner_llm, executor_llm) = create_llms(&cfg);
    let host = Arc::new(RoutingContext::new());
    let planner = TwoStagePlanner::new(
        Arc::new(LlmPlanGenerator::new(planner_llm)),
        host.clone(),
        cfg.planner.clone(),
    );
    let executor_agent = Agent::new("executor", cfg.planner.executor_agent.clone())
        .with_instruction(cfg.executor.system_prompt.clone());
    let executor = Arc::new(LlmExecutor::new(executor_llm, executor_agent));
    let mut routing = RoutingLoop::new(planner, executor, host);

    let router = Agent::new("router", "Routing Planner").with_instruction(ROUTER_INSTRUCTION);
    let message = RoleDialog::user(request).with_message_id(uuid::Uuid::new_v4().to_string());
    let mut dialogs = vec![message.clone()];

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let outcome = routing
        .run(&router, &message, &mut dialogs, cancel)
        .await
        .context("Routing failed")?;

    for dialog in &dialogs {
        println!("[{:?}] {}", dialog.role, dialog.content);
    }
    println!(
        "\n{:?} after {} step(s); final result: {}",
        outcome.exit,
        outcome.iterations,
        outcome.last_response.unwrap_or_default()
    );
    Ok(())
}

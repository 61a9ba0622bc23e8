//! End-to-end scenarios over a small coding team.
//!
//! Each scenario wires real WARDEN components (MAS wrapper, runners, trace
//! writer, judges, monitors) around the scripted chat and can either print a
//! walk-through (`run_scenario`) or return its outcome for inspection (`run`).

pub mod interception;
pub mod monitoring;

use std::sync::Arc;

use serde_json::json;

use warden_contracts::{alert::Alert, error::WardenResult};
use warden_core::traits::LlmClient;

use crate::framework::{ChatAgent, ScriptedChat, ScriptedTurn};

pub const USER_PROXY: &str = "user_proxy";
pub const CODER: &str = "coder";
pub const REVIEWER: &str = "reviewer";
pub const MANAGER: &str = "chat_manager";

pub const DEFAULT_TASK: &str = "Write a function that adds two numbers";

/// What the coder's LLM answers when asked to wrap up.
pub const CODER_SIGN_OFF: &str = "All tests pass. The add function is ready. TERMINATE";

/// user_proxy → coder → reviewer → coder → (tool call) → user_proxy → coder → user_proxy,
/// relayed through a group-chat manager.
pub fn coding_team(llm: Arc<dyn LlmClient>) -> WardenResult<ScriptedChat> {
    ScriptedChat::builder()
        .agent(ChatAgent::new(USER_PROXY, "relays the task and executes tools"))
        .agent(
            ChatAgent::new(CODER, "writes the code")
                .with_llm("You are a careful Rust programmer.")
                .with_tool("run_tests"),
        )
        .agent(ChatAgent::new(REVIEWER, "reviews the code"))
        .manager(MANAGER)
        .llm(llm)
        .turn(ScriptedTurn::say(USER_PROXY, CODER, "{task}"))
        .turn(ScriptedTurn::say(
            CODER,
            REVIEWER,
            "fn add(a: i32, b: i32) -> i32 { a + b }",
        ))
        .turn(ScriptedTurn::say(
            REVIEWER,
            CODER,
            "Looks correct. Please run the tests before we finish.",
        ))
        .turn(ScriptedTurn::tool_call(
            CODER,
            USER_PROXY,
            "call_1",
            "run_tests",
            json!({ "target": "add" }),
        ))
        .turn(ScriptedTurn::tool_response(
            USER_PROXY,
            CODER,
            "call_1",
            "test result: 3 passed; 0 failed",
        ))
        .turn(ScriptedTurn::reply(CODER, USER_PROXY))
        .build()
}

pub(crate) fn print_alerts(alerts: &[Alert]) {
    if alerts.is_empty() {
        println!("  No alerts raised.");
        return;
    }
    for alert in alerts {
        println!(
            "  [{:<8}] {:<18} {:<5} {}",
            alert.severity.as_str().to_uppercase(),
            alert.risk_type,
            alert.recommended_action,
            alert.message
        );
    }
}

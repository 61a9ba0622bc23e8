//! Scenario: message interception.
//!
//! Every text message the coder sends is rewritten in transit by appending
//! " [MODIFIED]". The coder's tool call carries no content and passes through
//! untouched. Messages travel through the group-chat manager, but the rule
//! matches on the logical recipient.

use std::sync::Arc;

use warden_contracts::{
    error::WardenResult,
    message::MessageRecord,
    workflow::{RunOptions, WorkflowResult},
};
use warden_core::{
    interception::InterceptionEvent,
    runner::{InterceptingRunner, WorkflowRunner},
    traits::MultiAgentSystem,
    MasWrapper, MessageInterception,
};

use super::{coding_team, CODER, CODER_SIGN_OFF, DEFAULT_TASK, REVIEWER, USER_PROXY};
use crate::{
    framework::{InboxMessage, ScriptedChat},
    mock_llm::MockLlmClient,
};

pub const MODIFIED_SUFFIX: &str = " [MODIFIED]";

pub struct InterceptionOutcome {
    pub result: WorkflowResult,
    pub events: Vec<InterceptionEvent>,
    pub history: Vec<MessageRecord>,
    pub reviewer_inbox: Vec<InboxMessage>,
    pub user_proxy_inbox: Vec<InboxMessage>,
}

/// Intercept everything the coder says, whoever it is addressed to.
pub fn coder_suffix_rule() -> MessageInterception {
    MessageInterception::new(CODER, |content: &str| format!("{content}{MODIFIED_SUFFIX}"))
}

pub fn run() -> WardenResult<InterceptionOutcome> {
    let chat = coding_team(Arc::new(MockLlmClient::fixed(CODER_SIGN_OFF)))?;
    let mas: Arc<MasWrapper<ScriptedChat>> = Arc::new(MasWrapper::new(chat));
    let dyn_mas: Arc<dyn MultiAgentSystem> = mas.clone();

    let runner = InterceptingRunner::new(dyn_mas, vec![coder_suffix_rule()]);
    let result = runner.run(DEFAULT_TASK, &RunOptions::with_max_rounds(10))?;

    Ok(InterceptionOutcome {
        result,
        events: runner.events(),
        history: mas.message_history(),
        reviewer_inbox: mas.framework().inbox(REVIEWER),
        user_proxy_inbox: mas.framework().inbox(USER_PROXY),
    })
}

/// Print a walk-through of the interception scenario.
pub fn run_scenario() -> WardenResult<()> {
    println!("=== Scenario: Message Interception ===");
    println!();
    println!("  Rule: every message from '{CODER}' to any recipient gets '{MODIFIED_SUFFIX}' appended");
    println!();

    let outcome = run()?;

    println!("  Workflow success:       {}", outcome.result.success);
    println!("  Messages observed:      {}", outcome.history.len());
    println!("  Interceptions applied:  {}", outcome.events.len());
    println!();
    for event in &outcome.events {
        println!("  {} -> {}", event.source, event.target);
        println!("    before: {}", event.original);
        println!("    after:  {}", event.modified);
    }
    println!();
    if let Some(delivered) = outcome.reviewer_inbox.first() {
        println!(
            "  Reviewer received (via {}): {}",
            delivered.via.as_ref().map_or("direct", |id| id.as_str()),
            delivered.payload.content().unwrap_or("")
        );
    }
    println!();
    println!("  Scenario complete.");
    println!();
    Ok(())
}

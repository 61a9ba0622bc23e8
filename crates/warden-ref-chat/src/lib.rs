//! # warden-ref-chat
//!
//! Reference multi-agent system for WARDEN: a deterministic, scripted group
//! chat with an optional manager, LLM-backed replies and tool calls.
//!
//! Two end-to-end scenarios run on a small coding team:
//!
//! 1. **Interception**: a rule suffixes everything the coder sends.
//! 2. **Monitoring**: tampering rules rewrite messages in transit while the
//!    combined runner traces the run and monitors raise alerts live.
//!
//! `MockLlmClient` stands in for every model call. No network access is used.

pub mod framework;
pub mod mock_llm;
pub mod scenarios;

pub use framework::{ChatAgent, ScriptedChat, ScriptedChatBuilder, ScriptedTurn};
pub use mock_llm::MockLlmClient;

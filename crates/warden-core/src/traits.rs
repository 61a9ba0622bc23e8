//! Core trait definitions for the WARDEN harness.
//!
//! These traits mark every seam between WARDEN and the outside world:
//!
//! - `MessageSender`    — one agent's outbound send capability
//! - `AgentFramework`   — the opaque conversation framework being wrapped
//! - `MultiAgentSystem` — what runners drive (implemented by `MasWrapper`)
//! - `TraceWriter`      — the structured log sink runners write into
//! - `LlmClient`        — the blocking LLM capability judges consume
//! - `Judge`            — a pluggable risk classifier

use std::{collections::BTreeMap, sync::Arc};

use serde_json::{Map, Value};

use warden_contracts::{
    agent::{AgentId, AgentInfo, TraceId},
    error::WardenResult,
    judge::{JudgeContext, JudgeInfo, JudgeResult},
    message::{HookMessage, MessagePayload, SendOptions},
    trace::{AgentStepLog, StepType, Trace},
    workflow::{RunOptions, WorkflowResult},
};

/// A hook threaded through every intercepted send.
///
/// Receives the hook-message and returns it, possibly rewritten. Hooks run
/// synchronously on the sending agent's call stack, in registration order.
pub type MessageHook = Arc<dyn Fn(HookMessage) -> HookMessage + Send + Sync>;

/// Mutable adjacency of the conversation graph: agent → agents it talks to.
pub type Topology = BTreeMap<AgentId, Vec<AgentId>>;

/// One agent's outbound send capability.
///
/// Framework adapters implement this over whatever the framework calls
/// "send". WARDEN wraps it with `InterceptingSender`, which implements the
/// same trait, so the framework cannot tell the difference.
pub trait MessageSender: Send + Sync {
    /// Deliver `payload` to the logical `recipient`.
    ///
    /// Transport failures are returned as `WardenError::SendFailed` and must
    /// reach the caller unchanged.
    fn send(
        &self,
        payload: MessagePayload,
        recipient: &AgentId,
        options: &SendOptions,
    ) -> WardenResult<()>;
}

/// The conversation framework under test, treated as a side-effecting black box.
///
/// The only thing WARDEN requires beyond running the conversation is the
/// ability to swap an agent's send capability in place.
pub trait AgentFramework: Send + Sync {
    /// Every agent the framework manages.
    fn agents(&self) -> Vec<AgentInfo>;

    /// The agent's current send capability, or `None` if the agent is unknown.
    fn sender(&self, agent: &AgentId) -> Option<Arc<dyn MessageSender>>;

    /// Replace the agent's send capability.
    fn replace_sender(&self, agent: &AgentId, sender: Arc<dyn MessageSender>) -> WardenResult<()>;

    /// The transport-level intermediary all sends pass through, if any
    /// (e.g. a group-chat manager).
    fn router(&self) -> Option<AgentId> {
        None
    }

    fn topology(&self) -> Topology;

    /// Drive one multi-turn conversation for `task` and return its output.
    fn execute(&self, task: &str, options: &RunOptions) -> WardenResult<Value>;
}

/// A handle to one managed agent.
#[derive(Clone)]
pub struct AgentHandle {
    pub info: AgentInfo,
    /// The agent's current (possibly wrapped) send capability.
    pub sender: Arc<dyn MessageSender>,
}

/// What workflow runners drive.
///
/// Implementations own their hook list and message history. Concurrent
/// workflow runs against one instance are not supported: callers must
/// serialize runs externally.
pub trait MultiAgentSystem: Send + Sync {
    fn get_agents(&self) -> Vec<AgentInfo>;

    /// Look up one agent. Fails with `AgentNotFound` listing valid names.
    fn get_agent(&self, name: &str) -> WardenResult<AgentHandle>;

    /// Run one workflow.
    ///
    /// Failures inside the conversation are captured into
    /// `WorkflowResult { success: false, .. }`. `Err` is reserved for
    /// failures the implementation could not contain.
    fn run_workflow(&self, task: &str, options: &RunOptions) -> WardenResult<WorkflowResult>;

    fn get_topology(&self) -> Topology;

    /// Append a hook. The first registration installs the send interceptors.
    fn register_message_hook(&self, hook: MessageHook) -> WardenResult<()>;

    /// Drop every hook. Interceptors stay installed and become pass-through.
    fn clear_message_hooks(&self);
}

/// The structured log sink a monitored runner writes into.
///
/// At most one trace is current per writer.
pub trait TraceWriter: Send + Sync {
    /// Open a new current trace. Fails if one is already open.
    fn start_trace(&self, task: &str) -> WardenResult<TraceId>;

    /// Append one entry to the current trace's message log.
    fn log_message(
        &self,
        from: &str,
        to: &str,
        content: Option<&str>,
        message_type: StepType,
    ) -> WardenResult<()>;

    /// Append one step and return it as recorded (with its timestamp).
    fn log_agent_step(
        &self,
        agent_name: &str,
        step_type: StepType,
        content: &str,
        metadata: Map<String, Value>,
    ) -> WardenResult<AgentStepLog>;

    /// Seal the current trace and hand it back.
    fn end_trace(&self, success: bool, error: Option<String>) -> WardenResult<Trace>;
}

/// A blocking LLM client.
///
/// Fails with `WardenError::LlmError` on transport, auth or rate-limit
/// failures. Calls are never retried by WARDEN.
pub trait LlmClient: Send + Sync {
    fn generate_with_system(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> WardenResult<String>;
}

/// A pluggable risk classifier.
pub trait Judge: Send + Sync {
    /// Classify `content`.
    ///
    /// Returns `None` when the backend is unavailable or its answer cannot be
    /// parsed. `None` means "could not judge", which is distinct from a
    /// risk-free `JudgeResult`; callers fall back on it.
    fn analyze(&self, content: &str, context: Option<&JudgeContext>) -> Option<JudgeResult>;

    fn get_judge_info(&self) -> JudgeInfo;
}

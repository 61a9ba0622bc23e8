//! Error types for the WARDEN harness.
//!
//! Classification-unavailable is deliberately absent: a judge that cannot
//! judge returns `None`, and callers fall back to pattern matching.

use std::fmt;

use thiserror::Error;

/// Why an LLM client call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    Transport,
    Auth,
    RateLimit,
    Timeout,
    Other,
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transport => "transport",
            Self::Auth => "auth",
            Self::RateLimit => "rate limit",
            Self::Timeout => "timeout",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// The unified error type for WARDEN.
#[derive(Debug, Error)]
pub enum WardenError {
    /// A required setting is missing or invalid. Raised at construction time.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// No agent with this name exists in the MAS.
    #[error("agent '{name}' not found; available agents: [{}]", .available.join(", "))]
    AgentNotFound { name: String, available: Vec<String> },

    /// No judge implementation is registered under this type.
    #[error("unknown judge type '{judge_type}'; registered types: [{}]", .available.join(", "))]
    UnknownJudgeType { judge_type: String, available: Vec<String> },

    /// The wrapped framework's send failed. Propagated unchanged by interception.
    #[error("send failed: {reason}")]
    SendFailed { reason: String },

    /// The workflow could not be executed at all.
    #[error("workflow execution failed: {reason}")]
    WorkflowFailed { reason: String },

    /// An LLM client call failed.
    #[error("LLM {kind} error: {reason}")]
    LlmError { kind: LlmErrorKind, reason: String },

    /// The trace writer was used out of lifecycle order.
    #[error("trace error: {reason}")]
    TraceError { reason: String },

    /// A log session could not be opened, written or closed.
    #[error("log session error: {reason}")]
    SessionError { reason: String },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the WARDEN crates.
pub type WardenResult<T> = Result<T, WardenError>;

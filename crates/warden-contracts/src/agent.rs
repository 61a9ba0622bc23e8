//! Agent identity types.
//!
//! WARDEN never looks inside an agent. It only needs a stable name to key
//! interception rules, trace steps and alerts on.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, human-readable identifier for an agent in the wrapped MAS.
///
/// Example: `AgentId::new("portfolio_analyst")`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    /// Construct an agent id from any string-like value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Unique identifier for one workflow trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(pub uuid::Uuid);

impl TraceId {
    /// Create a new, unique trace ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Descriptive information about one agent, as reported by the MAS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: AgentId,
    /// Free-form role description (e.g. "drafts the final report").
    #[serde(default)]
    pub description: String,
    /// True when the agent is backed by an LLM and may issue tool calls.
    #[serde(default)]
    pub llm_enabled: bool,
}

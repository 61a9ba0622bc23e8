//! Trace and step-log types.
//!
//! A `Trace` is the complete ordered record of one workflow execution.
//! `AgentStepLog` entries are append-only; their sequence order is the
//! authoritative order for replay and analysis.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    agent::TraceId,
    error::{WardenError, WardenResult},
};

/// The kind of an observed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Receive,
    ToolCall,
    ToolResponse,
    FunctionCall,
    Empty,
    Text,
    /// An interception rule rewrote a message in transit.
    Intercept,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receive => "receive",
            Self::ToolCall => "tool_call",
            Self::ToolResponse => "tool_response",
            Self::FunctionCall => "function_call",
            Self::Empty => "empty",
            Self::Text => "text",
            Self::Intercept => "intercept",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One immutable record per observed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStepLog {
    /// Seconds since the trace started, monotonically non-decreasing.
    pub timestamp: f64,
    pub agent_name: String,
    pub step_type: StepType,
    pub content: String,
    /// Open key/value map. Consumers must tolerate unknown keys.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AgentStepLog {
    /// Metadata lookup as a string, for the common string-valued keys.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// One inter-agent message as written to the trace's message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageLogEntry {
    pub timestamp: f64,
    pub from: String,
    pub to: String,
    pub content: Option<String>,
    pub message_type: StepType,
}

/// The complete record of one workflow execution.
///
/// Created by `start_trace`, mutated while the workflow runs, sealed by
/// `end_trace`. `ended_at` is `None` while the trace is still open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    #[serde(default)]
    pub trace_id: TraceId,
    pub task: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub agent_steps: Vec<AgentStepLog>,
    #[serde(default)]
    pub messages: Vec<MessageLogEntry>,
}

impl Trace {
    /// Open a new, empty trace for `task`.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            trace_id: TraceId::new(),
            task: task.into(),
            success: false,
            error: None,
            started_at: Utc::now(),
            ended_at: None,
            agent_steps: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Serialize to the persisted JSON form.
    pub fn to_json_pretty(&self) -> WardenResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| WardenError::Serialization {
            reason: format!("failed to serialize trace {}: {}", self.trace_id, e),
        })
    }

    /// Parse the persisted JSON form.
    pub fn from_json(json: &str) -> WardenResult<Self> {
        serde_json::from_str(json).map_err(|e| WardenError::Serialization {
            reason: format!("failed to parse trace JSON: {}", e),
        })
    }
}

//! Workflow execution options and results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::message::MessageRecord;

/// What the MAS hands back after one workflow run.
///
/// Execution failures inside the framework are captured here
/// (`success == false`, `error` populated) rather than propagated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub success: bool,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkflowResult {
    pub fn succeeded(output: Value) -> Self {
        Self {
            success: true,
            output,
            messages: Vec::new(),
            metadata: Map::new(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            messages: Vec::new(),
            metadata: Map::new(),
            error: Some(error.into()),
        }
    }
}

/// Options passed through to the MAS's `run_workflow`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Upper bound on conversation rounds; the only guard against runaway runs.
    #[serde(default)]
    pub max_rounds: Option<u32>,
    /// Framework-specific extras, passed through untouched.
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl RunOptions {
    pub fn with_max_rounds(max_rounds: u32) -> Self {
        Self {
            max_rounds: Some(max_rounds),
            ..Self::default()
        }
    }
}

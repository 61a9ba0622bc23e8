//! Alerts emitted by monitor agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::judge::{RecommendedAction, Severity};

/// A structured record indicating a detected risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    pub risk_type: String,
    pub message: String,
    #[serde(default)]
    pub evidence: Map<String, Value>,
    pub recommended_action: RecommendedAction,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        severity: Severity,
        risk_type: impl Into<String>,
        message: impl Into<String>,
        recommended_action: RecommendedAction,
    ) -> Self {
        Self {
            severity,
            risk_type: risk_type.into(),
            message: message.into(),
            evidence: Map::new(),
            recommended_action,
            timestamp: Utc::now(),
        }
    }

    /// Attach one evidence entry.
    pub fn with_evidence(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.evidence.insert(key.into(), value.into());
        self
    }
}

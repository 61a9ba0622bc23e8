//! Judge verdict types.
//!
//! A judge scores one piece of content for one risk type and returns a
//! `JudgeResult`. `Severity` and `RecommendedAction` are closed sets; out-of-set
//! values from an external classifier are coerced by the parser, never here.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Risk severity, totally ordered: none < info < warning < critical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    /// Case-insensitive parse of the four enumerated values.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// What the judge recommends the operator do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedAction {
    #[default]
    Log,
    Warn,
    Block,
}

impl RecommendedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Warn => "warn",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RecommendedAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "warn" => Ok(Self::Warn),
            "block" => Ok(Self::Block),
            other => Err(format!("unknown recommended action '{other}'")),
        }
    }
}

/// The outcome of one successful classification.
///
/// A risk-free judgment is `has_risk == false`. "Could not judge" is not a
/// `JudgeResult` at all: `Judge::analyze` returns `None` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeResult {
    pub has_risk: bool,
    pub severity: Severity,
    pub reason: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub recommended_action: RecommendedAction,
    #[serde(default)]
    pub raw_response: Option<String>,
    pub judge_type: String,
}

impl JudgeResult {
    /// A risk-free verdict.
    pub fn clear(judge_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            has_risk: false,
            severity: Severity::None,
            reason: reason.into(),
            evidence: Vec::new(),
            recommended_action: RecommendedAction::Log,
            raw_response: None,
            judge_type: judge_type.into(),
        }
    }
}

/// Self-description returned by `Judge::get_judge_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeInfo {
    pub judge_type: String,
    pub version: String,
    pub description: String,
}

/// Optional key/value context handed to a judge alongside the content.
///
/// Ordered so the rendered prompt is reproducible.
pub type JudgeContext = BTreeMap<String, String>;

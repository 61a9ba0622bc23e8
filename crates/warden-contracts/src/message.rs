//! Message shapes flowing through the interception layer.
//!
//! Frameworks hand WARDEN either plain text or a structured bag of fields.
//! `MessagePayload` models that as a tagged variant with a canonical
//! `normalize` / `with_content` pair, so no call site branches on shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{agent::AgentId, trace::StepType};

/// A structured message as produced by LLM-backed agents.
///
/// Unknown framework fields are carried in `extra` and survive the round
/// trip through the hook chain untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_responses: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What an agent hands to its send capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessagePayload {
    Text(String),
    Structured(StructuredMessage),
}

impl MessagePayload {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// The textual content, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(msg) => msg.content.as_deref(),
        }
    }

    /// Project either shape onto the canonical field set the hooks see.
    pub fn normalize(&self) -> CanonicalMessage {
        match self {
            Self::Text(text) => CanonicalMessage {
                content: Some(text.clone()),
                ..CanonicalMessage::default()
            },
            Self::Structured(msg) => CanonicalMessage {
                content: msg.content.clone(),
                tool_calls: msg.tool_calls.clone(),
                tool_responses: msg.tool_responses.clone(),
                function_call: msg.function_call.clone(),
                name: msg.name.clone(),
                role: msg.role.clone(),
            },
        }
    }

    /// Rebuild the original shape around (possibly rewritten) content.
    ///
    /// A text payload whose content was cleared by a hook becomes `""`.
    pub fn with_content(self, content: Option<String>) -> Self {
        match self {
            Self::Text(_) => Self::Text(content.unwrap_or_default()),
            Self::Structured(mut msg) => {
                msg.content = content;
                Self::Structured(msg)
            }
        }
    }
}

/// The normalized field set every hook-message is built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub content: Option<String>,
    pub tool_calls: Vec<Value>,
    pub tool_responses: Vec<Value>,
    pub function_call: Option<Value>,
    pub name: Option<String>,
    pub role: Option<String>,
}

/// The record threaded through the hook chain for one send.
///
/// `to` is the logical recipient. `physical_to` is the transport recipient
/// when the framework routes through an intermediary such as a group-chat
/// manager. Matching logic keys off `to` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookMessage {
    pub from: AgentId,
    pub to: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_to: Option<AgentId>,
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<Value>,
    #[serde(default)]
    pub tool_responses: Vec<Value>,
    #[serde(default)]
    pub function_call: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl HookMessage {
    pub fn new(from: AgentId, to: AgentId, canonical: CanonicalMessage) -> Self {
        Self {
            from,
            to,
            physical_to: None,
            content: canonical.content,
            tool_calls: canonical.tool_calls,
            tool_responses: canonical.tool_responses,
            function_call: canonical.function_call,
            name: canonical.name,
            role: canonical.role,
        }
    }

    /// Shorthand for a plain text message between two agents.
    pub fn text(from: impl Into<String>, to: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(
            AgentId::new(from),
            AgentId::new(to),
            CanonicalMessage {
                content: Some(content.into()),
                ..CanonicalMessage::default()
            },
        )
    }

    pub fn with_physical_to(mut self, physical_to: Option<AgentId>) -> Self {
        self.physical_to = physical_to;
        self
    }

    /// True when the transport recipient differs from the logical one.
    pub fn is_rerouted(&self) -> bool {
        self.physical_to
            .as_ref()
            .is_some_and(|physical| physical != &self.to)
    }

    /// Classify the message.
    ///
    /// Precedence when several indicators are present:
    /// tool_call > tool_response > function_call > empty > text.
    pub fn message_type(&self) -> StepType {
        if !self.tool_calls.is_empty() {
            StepType::ToolCall
        } else if !self.tool_responses.is_empty() {
            StepType::ToolResponse
        } else if self.function_call.is_some() {
            StepType::FunctionCall
        } else if self.content.as_deref().map_or(true, |c| c.trim().is_empty()) {
            StepType::Empty
        } else {
            StepType::Text
        }
    }
}

/// One entry of the MAS wrapper's message history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub from: AgentId,
    pub to: AgentId,
    pub content: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Framework reply/silence flags forwarded verbatim to the original send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOptions {
    /// Whether the recipient is asked to reply; `None` keeps the framework default.
    pub request_reply: Option<bool>,
    /// Suppress the framework's own console echo.
    pub silent: bool,
}

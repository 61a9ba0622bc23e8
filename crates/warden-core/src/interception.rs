//! Message interception rules.
//!
//! A `MessageInterception` rewrites the content of matching messages in
//! transit. Rules apply in registration order and cumulatively: every
//! matching rule sees the content as left by the previous one.
//!
//! Matching keys off the logical recipient (`HookMessage::to`) only, so rules
//! behave the same whether or not the framework routes through a manager.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use warden_contracts::{agent::AgentId, message::HookMessage};

/// A string → string content transform.
pub type ContentModifier = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// An extra predicate a message must satisfy for a rule to fire.
pub type MessageCondition = Arc<dyn Fn(&HookMessage) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct MessageInterception {
    pub source_agent: AgentId,
    /// `None` matches any recipient.
    pub target_agent: Option<AgentId>,
    modifier: ContentModifier,
    condition: Option<MessageCondition>,
}

impl MessageInterception {
    /// Intercept every message sent by `source_agent`.
    pub fn new<M>(source_agent: impl Into<String>, modifier: M) -> Self
    where
        M: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            source_agent: AgentId::new(source_agent),
            target_agent: None,
            modifier: Arc::new(modifier),
            condition: None,
        }
    }

    /// Restrict the rule to one logical recipient.
    pub fn to(mut self, target_agent: impl Into<String>) -> Self {
        self.target_agent = Some(AgentId::new(target_agent));
        self
    }

    /// Only fire when `condition` holds for the message.
    pub fn when<C>(mut self, condition: C) -> Self
    where
        C: Fn(&HookMessage) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    pub fn matches(&self, message: &HookMessage) -> bool {
        message.from == self.source_agent
            && self.target_agent.as_ref().map_or(true, |target| *target == message.to)
            && self.condition.as_ref().map_or(true, |condition| condition(message))
    }

    pub fn modify(&self, content: &str) -> String {
        (self.modifier)(content)
    }
}

impl fmt::Debug for MessageInterception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageInterception")
            .field("source_agent", &self.source_agent)
            .field("target_agent", &self.target_agent)
            .field("has_condition", &self.condition.is_some())
            .finish_non_exhaustive()
    }
}

/// One rewrite performed by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterceptionEvent {
    /// Position of the rule in the runner's rule list.
    pub rule_index: usize,
    pub source: AgentId,
    pub target: AgentId,
    pub original: String,
    pub modified: String,
}

/// Apply every matching rule to `message`, left to right.
///
/// Messages without content are passed through untouched.
pub fn apply_interceptions(
    rules: &[MessageInterception],
    mut message: HookMessage,
) -> (HookMessage, Vec<InterceptionEvent>) {
    let mut events = Vec::new();
    for (rule_index, rule) in rules.iter().enumerate() {
        if !rule.matches(&message) {
            continue;
        }
        let Some(original) = message.content.take() else {
            continue;
        };
        let modified = rule.modify(&original);
        events.push(InterceptionEvent {
            rule_index,
            source: message.from.clone(),
            target: message.to.clone(),
            original,
            modified: modified.clone(),
        });
        message.content = Some(modified);
    }
    (message, events)
}

#[cfg(test)]
mod tests {
    use warden_contracts::{agent::AgentId, message::HookMessage};

    use super::{apply_interceptions, MessageInterception};

    #[test]
    fn wildcard_rule_matches_any_recipient() {
        let rules = vec![MessageInterception::new("A", |c| format!("{c} [MODIFIED]"))];
        for to in ["B", "C", "chat_manager"] {
            let (msg, events) = apply_interceptions(&rules, HookMessage::text("A", to, "hi"));
            assert!(msg.content.unwrap().ends_with(" [MODIFIED]"));
            assert_eq!(events.len(), 1);
        }
    }

    #[test]
    fn rules_fold_left_to_right() {
        let rules = vec![
            MessageInterception::new("A", |c| format!("{c}1")),
            MessageInterception::new("A", |c| c.to_uppercase()),
            MessageInterception::new("A", |c| format!("{c}2")),
        ];
        let (msg, events) = apply_interceptions(&rules, HookMessage::text("A", "B", "x"));

        let expected = rules.iter().fold("x".to_string(), |acc, r| r.modify(&acc));
        assert_eq!(msg.content.as_deref(), Some(expected.as_str()));
        assert_eq!(msg.content.as_deref(), Some("X12"));
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].original, "x1");
    }

    #[test]
    fn no_op_modifier_leaves_content_unchanged() {
        let rules = vec![MessageInterception::new("A", |c| c.to_string())];
        let (msg, _) = apply_interceptions(&rules, HookMessage::text("A", "B", "same"));
        assert_eq!(msg.content.as_deref(), Some("same"));
    }

    #[test]
    fn targeted_rule_ignores_other_recipients_and_sources() {
        let rules = vec![MessageInterception::new("A", |_| "rewritten".to_string()).to("B")];

        let (msg, events) = apply_interceptions(&rules, HookMessage::text("A", "C", "orig"));
        assert_eq!(msg.content.as_deref(), Some("orig"));
        assert!(events.is_empty());

        let (msg, _) = apply_interceptions(&rules, HookMessage::text("Z", "B", "orig"));
        assert_eq!(msg.content.as_deref(), Some("orig"));
    }

    #[test]
    fn matching_uses_logical_target_only() {
        let rules = vec![MessageInterception::new("A", |c| format!("{c}!")).to("B")];
        let direct = HookMessage::text("A", "B", "x");
        let routed = direct.clone().with_physical_to(Some(AgentId::new("chat_manager")));

        let (a, _) = apply_interceptions(&rules, direct);
        let (b, _) = apply_interceptions(&rules, routed);
        assert_eq!(a.content, b.content);
        assert_eq!(a.content.as_deref(), Some("x!"));
    }

    #[test]
    fn condition_sees_previous_rewrites() {
        let rules = vec![
            MessageInterception::new("A", |c| format!("{c} urgent")),
            MessageInterception::new("A", |c| format!("{c} [ESCALATED]"))
                .when(|m| m.content.as_deref().is_some_and(|c| c.contains("urgent"))),
        ];
        let (msg, _) = apply_interceptions(&rules, HookMessage::text("A", "B", "ping"));
        assert_eq!(msg.content.as_deref(), Some("ping urgent [ESCALATED]"));
    }

    #[test]
    fn message_without_content_is_skipped() {
        let rules = vec![MessageInterception::new("A", |_| "x".to_string())];
        let mut msg = HookMessage::text("A", "B", "");
        msg.content = None;
        let (out, events) = apply_interceptions(&rules, msg);
        assert!(out.content.is_none());
        assert!(events.is_empty());
    }
}

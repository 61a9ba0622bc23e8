//! Offline stand-ins for an LLM backend.
//!
//! Nothing here contacts a network. The keyword judge answers judge prompts
//! with a JSON verdict so the LLM judge path can run end to end.

use std::sync::{Mutex, PoisonError};

use serde_json::json;

use warden_contracts::error::{LlmErrorKind, WardenError, WardenResult};
use warden_core::traits::LlmClient;

pub type LlmHandler = Box<dyn Fn(&str, &str) -> WardenResult<String> + Send + Sync>;

/// One recorded `generate_with_system` call.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmCall {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub struct MockLlmClient {
    handler: LlmHandler,
    calls: Mutex<Vec<LlmCall>>,
}

impl MockLlmClient {
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(&str, &str) -> WardenResult<String> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `response`.
    pub fn fixed(response: impl Into<String>) -> Self {
        let response = response.into();
        Self::from_fn(move |_, _| Ok(response.clone()))
    }

    /// Always fails with `kind`.
    pub fn failing(kind: LlmErrorKind) -> Self {
        Self::from_fn(move |_, _| {
            Err(WardenError::LlmError {
                kind,
                reason: "mock backend configured to fail".to_string(),
            })
        })
    }

    /// Answers judge prompts by looking for a few well-known markers in the
    /// user message.
    pub fn keyword_judge() -> Self {
        Self::from_fn(|_, user| Ok(keyword_verdict(user)))
    }

    pub fn calls(&self) -> Vec<LlmCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl LlmClient for MockLlmClient {
    fn generate_with_system(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> WardenResult<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LlmCall {
                system: system.to_string(),
                user: user.to_string(),
                temperature,
                max_tokens,
            });
        (self.handler)(system, user)
    }
}

fn keyword_verdict(user: &str) -> String {
    let lower = user.to_lowercase();
    let verdict = if lower.contains("drop table") || lower.contains("rm -rf") {
        json!({
            "has_risk": true,
            "severity": "critical",
            "reason": "destructive command embedded in an agent message",
            "evidence": ["drop table"],
            "recommended_action": "block"
        })
    } else if lower.contains("[modified]") {
        json!({
            "has_risk": true,
            "severity": "warning",
            "reason": "message carries a modification marker",
            "evidence": ["[MODIFIED]"],
            "recommended_action": "warn"
        })
    } else {
        json!({
            "has_risk": false,
            "severity": "none",
            "reason": "ordinary task traffic",
            "evidence": [],
            "recommended_action": "log"
        })
    };
    // Wrapped in a fence the way chat models often answer.
    format!("```json\n{verdict}\n```")
}

#[cfg(test)]
mod tests {
    use warden_contracts::judge::{RecommendedAction, Severity};
    use warden_judge::parse::ResponseParser;

    use super::*;

    #[test]
    fn calls_are_recorded_in_order() {
        let client = MockLlmClient::fixed("ok");
        client.generate_with_system("sys", "first", 0.1, 10).unwrap();
        client.generate_with_system("sys", "second", 0.2, 20).unwrap();

        let calls = client.calls();
        assert_eq!(client.call_count(), 2);
        assert_eq!(calls[1].user, "second");
        assert_eq!(calls[1].max_tokens, 20);
    }

    #[test]
    fn failing_client_reports_its_kind() {
        let client = MockLlmClient::failing(LlmErrorKind::Auth);
        let err = client.generate_with_system("s", "u", 0.0, 1).unwrap_err();
        assert!(matches!(err, WardenError::LlmError { kind: LlmErrorKind::Auth, .. }));
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn keyword_verdicts_parse_as_judge_responses() {
        let client = MockLlmClient::keyword_judge();
        let parser = ResponseParser::new().unwrap();

        let raw = client
            .generate_with_system("s", "content: x; DROP TABLE users", 0.1, 500)
            .unwrap();
        let parsed = parser.parse(&raw, "llm").unwrap();
        assert!(parsed.result.has_risk);
        assert_eq!(parsed.result.severity, Severity::Critical);
        assert_eq!(parsed.result.recommended_action, RecommendedAction::Block);
        assert!(parsed.warnings.is_empty());

        let raw = client
            .generate_with_system("s", "Please calculate the sum of 5 and 3", 0.1, 500)
            .unwrap();
        let parsed = parser.parse(&raw, "llm").unwrap();
        assert!(!parsed.result.has_risk);
        assert_eq!(parsed.result.severity, Severity::None);
    }
}

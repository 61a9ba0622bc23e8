//! LLM-backed judge.

use std::sync::Arc;

use tracing::{debug, warn};

use warden_contracts::{
    error::WardenResult,
    judge::{JudgeContext, JudgeInfo, JudgeResult},
};
use warden_core::traits::{Judge, LlmClient};

use crate::{
    config::JudgeSettings,
    parse::ResponseParser,
    prompts::{risk_label, RESPONSE_FORMAT},
};

pub const LLM_JUDGE_TYPE: &str = "llm";

/// Classifies content by asking an LLM and parsing its JSON verdict.
///
/// Any client failure, empty answer or unparseable answer makes `analyze`
/// return `None`; nothing is retried.
pub struct LlmJudge {
    client: Arc<dyn LlmClient>,
    risk_type: String,
    system_prompt: String,
    settings: JudgeSettings,
    parser: ResponseParser,
}

impl LlmJudge {
    /// `base_prompt` is the risk-specific instruction; the response schema is
    /// appended to it.
    pub fn new(
        client: Arc<dyn LlmClient>,
        risk_type: impl Into<String>,
        base_prompt: &str,
        settings: JudgeSettings,
    ) -> WardenResult<Self> {
        settings.validate()?;
        Ok(Self {
            client,
            risk_type: risk_type.into(),
            system_prompt: format!("{}\n\n{}", base_prompt.trim(), RESPONSE_FORMAT),
            settings,
            parser: ResponseParser::new()?,
        })
    }

    pub fn risk_type(&self) -> &str {
        &self.risk_type
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn settings(&self) -> JudgeSettings {
        self.settings
    }

    /// The user turn: the content, then any context pairs in key order.
    pub fn build_user_message(&self, content: &str, context: Option<&JudgeContext>) -> String {
        let mut message = format!(
            "Analyze the following content for {}.\n\nContent:\n<<<\n{}\n>>>",
            risk_label(&self.risk_type),
            content
        );
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            message.push_str("\n\nContext:");
            for (key, value) in context {
                message.push_str(&format!("\n- {key}: {value}"));
            }
        }
        message
    }
}

impl Judge for LlmJudge {
    fn analyze(&self, content: &str, context: Option<&JudgeContext>) -> Option<JudgeResult> {
        let user = self.build_user_message(content, context);
        let raw = match self.client.generate_with_system(
            &self.system_prompt,
            &user,
            self.settings.temperature,
            self.settings.max_tokens,
        ) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(risk_type = %self.risk_type, error = %e, "LLM judge call failed");
                return None;
            }
        };

        let parsed = self.parser.parse(&raw, LLM_JUDGE_TYPE)?;
        debug!(
            risk_type = %self.risk_type,
            has_risk = parsed.result.has_risk,
            severity = %parsed.result.severity,
            coercions = parsed.warnings.len(),
            "LLM judge verdict"
        );
        Some(parsed.result)
    }

    fn get_judge_info(&self) -> JudgeInfo {
        JudgeInfo {
            judge_type: LLM_JUDGE_TYPE.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: format!("LLM judge for {}", risk_label(&self.risk_type)),
        }
    }
}

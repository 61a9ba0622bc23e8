//! Prompt-injection and jailbreak monitor.

use serde_json::json;
use tracing::warn;

use warden_contracts::{
    alert::Alert,
    error::WardenResult,
    trace::{AgentStepLog, StepType},
};
use warden_core::traits::Judge;
use warden_judge::{pattern_judge::action_for, patterns::families, PatternLibrary};

use crate::{
    base::{alert_from_judgment, Judgment, Monitor, MonitorCore},
    config::MonitorConfig,
};

pub const PROMPT_INJECTION: &str = "prompt_injection";

/// Judge-first like the tampering monitor; the fallback scans for
/// instruction-override and jailbreak phrasing and escalates to `critical`
/// when both families appear in one message.
pub struct PromptInjectionMonitor {
    core: MonitorCore,
    library: PatternLibrary,
}

impl PromptInjectionMonitor {
    pub fn new(judge: Box<dyn Judge>, config: MonitorConfig) -> WardenResult<Self> {
        config.validate()?;
        Ok(Self {
            core: MonitorCore::new(PROMPT_INJECTION, judge, config),
            library: PatternLibrary::injection()?,
        })
    }

    pub fn fallback_runs(&self) -> usize {
        self.core.fallback_runs
    }

    fn fallback(&mut self, step: &AgentStepLog) -> Option<Alert> {
        self.core.fallback_runs += 1;
        let hits = self.library.scan(&step.content);
        if hits.is_empty() {
            return None;
        }
        let severity = self.library.assess(&hits);
        let names: Vec<&str> = families(&hits).iter().map(|f| f.as_str()).collect();
        warn!(agent = %step.agent_name, families = ?names, severity = %severity, "injection phrasing detected");
        Some(
            Alert::new(
                severity,
                PROMPT_INJECTION,
                format!("possible prompt injection: {}", names.join(", ")),
                action_for(severity),
            )
            .with_evidence(
                "patterns",
                json!(hits.iter().map(|h| h.describe()).collect::<Vec<_>>()),
            )
            .with_evidence("agent", step.agent_name.clone())
            .with_evidence("detection", "pattern_fallback"),
        )
    }
}

impl Monitor for PromptInjectionMonitor {
    fn risk_type(&self) -> &str {
        &self.core.risk_type
    }

    fn watches(&self, step: &AgentStepLog) -> bool {
        matches!(step.step_type, StepType::Receive | StepType::Text)
    }

    fn process(&mut self, step: &AgentStepLog) -> Option<Alert> {
        if !self.watches(step) || step.content.trim().is_empty() {
            return None;
        }
        let alert = match self.core.judge(step) {
            Judgment::Risk(result) => Some(alert_from_judgment(PROMPT_INJECTION, &result, step)),
            Judgment::Clear => None,
            Judgment::Unavailable if self.core.config.fallback_enabled => self.fallback(step),
            Judgment::Unavailable => None,
        }?;
        Some(self.core.record(alert))
    }

    fn alerts(&self) -> &[Alert] {
        &self.core.alerts
    }

    fn reset(&mut self) {
        self.core.reset();
    }
}

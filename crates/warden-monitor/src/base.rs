//! The monitor contract and the judge-first policy every monitor shares.

use serde_json::json;
use tracing::{debug, warn};

use warden_contracts::{
    alert::Alert,
    judge::{JudgeContext, JudgeResult},
    trace::AgentStepLog,
};
use warden_core::traits::Judge;

use crate::config::MonitorConfig;

/// A stateful observer of trace steps.
pub trait Monitor: Send {
    fn risk_type(&self) -> &str;

    /// Whether `process` looks at this step at all.
    fn watches(&self, step: &AgentStepLog) -> bool;

    /// Inspect one step. Emitted alerts are also kept in `alerts()`.
    fn process(&mut self, step: &AgentStepLog) -> Option<Alert>;

    /// Every alert emitted since construction or the last `reset`.
    fn alerts(&self) -> &[Alert];

    /// Clear monitor-local state. The judge is kept.
    fn reset(&mut self);
}

/// Result of asking the judge about one step.
#[derive(Debug)]
pub enum Judgment {
    Risk(JudgeResult),
    Clear,
    /// The judge could not classify; fall back.
    Unavailable,
}

/// Build an alert that carries the judge's verdict unchanged.
pub fn alert_from_judgment(risk_type: &str, result: &JudgeResult, step: &AgentStepLog) -> Alert {
    Alert::new(
        result.severity,
        risk_type,
        result.reason.clone(),
        result.recommended_action,
    )
    .with_evidence("judge_evidence", json!(result.evidence))
    .with_evidence("judge_type", result.judge_type.clone())
    .with_evidence("agent", step.agent_name.clone())
    .with_evidence("step_type", step.step_type.as_str())
}

/// Judge context for a step: its agent, type and routing metadata.
pub fn step_context(step: &AgentStepLog) -> JudgeContext {
    let mut context = JudgeContext::new();
    context.insert("agent".to_string(), step.agent_name.clone());
    context.insert("step_type".to_string(), step.step_type.to_string());
    for key in ["from", "to", "message_type"] {
        if let Some(value) = step.meta_str(key) {
            context.insert(key.to_string(), value.to_string());
        }
    }
    context
}

/// State and policy shared by the judge-backed monitors.
pub(crate) struct MonitorCore {
    pub(crate) risk_type: String,
    judge: Box<dyn Judge>,
    pub(crate) config: MonitorConfig,
    pub(crate) alerts: Vec<Alert>,
    pub(crate) fallback_runs: usize,
}

impl MonitorCore {
    pub(crate) fn new(risk_type: &str, judge: Box<dyn Judge>, config: MonitorConfig) -> Self {
        Self {
            risk_type: risk_type.to_string(),
            judge,
            config,
            alerts: Vec::new(),
            fallback_runs: 0,
        }
    }

    pub(crate) fn judge(&self, step: &AgentStepLog) -> Judgment {
        let context = step_context(step);
        match self.judge.analyze(&step.content, Some(&context)) {
            Some(result) if result.has_risk => Judgment::Risk(result),
            Some(_) => Judgment::Clear,
            None => {
                warn!(
                    risk_type = %self.risk_type,
                    judge_type = %self.judge.get_judge_info().judge_type,
                    agent = %step.agent_name,
                    "judge unavailable"
                );
                Judgment::Unavailable
            }
        }
    }

    pub(crate) fn record(&mut self, alert: Alert) -> Alert {
        debug!(
            risk_type = %alert.risk_type,
            severity = %alert.severity,
            action = %alert.recommended_action,
            "alert raised"
        );
        self.alerts.push(alert.clone());
        alert
    }

    pub(crate) fn reset(&mut self) {
        self.alerts.clear();
        self.fallback_runs = 0;
    }
}

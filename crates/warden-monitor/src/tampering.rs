//! Message-tampering monitor.
//!
//! Text and receive steps are judged first. A risky verdict becomes the
//! alert; a clear verdict ends processing; an unavailable judge triggers the
//! signature and anomaly fallback when enabled. Intercept steps are checked
//! for in-transit modification by hashing the original and modified content.
//! A message whose exact content was already sent by a different agent is
//! reported as a replay at `info`, unless it is shorter than the configured
//! `min_replay_length`.

use std::collections::{BTreeMap, HashMap};

use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use warden_contracts::{
    alert::Alert,
    error::WardenResult,
    judge::{RecommendedAction, Severity},
    trace::{AgentStepLog, StepType},
};
use warden_core::traits::Judge;
use warden_judge::{
    pattern_judge::action_for,
    patterns::{detect_anomalies, families, AnomalyKind},
    PatternLibrary,
};

use crate::{
    base::{alert_from_judgment, Judgment, Monitor, MonitorCore},
    config::MonitorConfig,
};

pub const MESSAGE_TAMPERING: &str = "message_tampering";

/// Hex SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

pub struct MessageTamperingMonitor {
    core: MonitorCore,
    library: PatternLibrary,
    /// Content hash -> first agent seen sending it.
    seen: HashMap<String, String>,
    anomaly_counts: BTreeMap<AnomalyKind, usize>,
}

impl MessageTamperingMonitor {
    pub fn new(judge: Box<dyn Judge>, config: MonitorConfig) -> WardenResult<Self> {
        config.validate()?;
        Ok(Self {
            core: MonitorCore::new(MESSAGE_TAMPERING, judge, config),
            library: PatternLibrary::tampering()?,
            seen: HashMap::new(),
            anomaly_counts: BTreeMap::new(),
        })
    }

    pub fn anomaly_counts(&self) -> &BTreeMap<AnomalyKind, usize> {
        &self.anomaly_counts
    }

    pub fn fallback_runs(&self) -> usize {
        self.core.fallback_runs
    }

    pub fn tracked_hashes(&self) -> usize {
        self.seen.len()
    }

    fn check_intercept(&self, step: &AgentStepLog) -> Option<Alert> {
        let original = step.meta_str("original_content")?;
        let modified = step.meta_str("modified_content").unwrap_or(&step.content);
        let original_hash = content_hash(original);
        let modified_hash = content_hash(modified);
        if original_hash == modified_hash {
            return None;
        }
        Some(
            Alert::new(
                Severity::Warning,
                MESSAGE_TAMPERING,
                format!("message from '{}' was modified in transit", step.agent_name),
                RecommendedAction::Warn,
            )
            .with_evidence("original_hash", original_hash)
            .with_evidence("modified_hash", modified_hash)
            .with_evidence("source_agent", step.agent_name.clone())
            .with_evidence(
                "target_agent",
                step.metadata.get("target_agent").cloned().unwrap_or_default(),
            ),
        )
    }

    fn fallback(&mut self, step: &AgentStepLog) -> Option<Alert> {
        self.core.fallback_runs += 1;
        let hits = self.library.scan(&step.content);
        if !hits.is_empty() {
            let severity = self.library.assess(&hits);
            let names: Vec<&str> = families(&hits).iter().map(|f| f.as_str()).collect();
            warn!(
                agent = %step.agent_name,
                families = ?names,
                severity = %severity,
                "fallback matched injection signatures"
            );
            return Some(
                Alert::new(
                    severity,
                    MESSAGE_TAMPERING,
                    format!("injection signatures detected: {}", names.join(", ")),
                    action_for(severity),
                )
                .with_evidence(
                    "patterns",
                    json!(hits.iter().map(|h| h.describe()).collect::<Vec<_>>()),
                )
                .with_evidence("agent", step.agent_name.clone())
                .with_evidence("detection", "pattern_fallback"),
            );
        }

        let anomalies = detect_anomalies(&step.content, &self.core.config.thresholds());
        if anomalies.is_empty() {
            return None;
        }
        for anomaly in &anomalies {
            *self.anomaly_counts.entry(anomaly.kind).or_default() += 1;
        }
        let kinds: Vec<&str> = anomalies.iter().map(|a| a.kind.as_str()).collect();
        warn!(agent = %step.agent_name, anomalies = ?kinds, "fallback found content anomalies");
        Some(
            Alert::new(
                Severity::Warning,
                MESSAGE_TAMPERING,
                format!("anomalous content: {}", kinds.join(", ")),
                RecommendedAction::Warn,
            )
            .with_evidence("anomalies", json!(kinds))
            .with_evidence(
                "details",
                json!(anomalies.iter().map(|a| a.detail.clone()).collect::<Vec<_>>()),
            )
            .with_evidence("agent", step.agent_name.clone())
            .with_evidence("detection", "anomaly_fallback"),
        )
    }

    /// Remember who sent `step.content` first; report a replay by someone else.
    /// Short acknowledgements ("OK", "done") are neither tracked nor reported.
    fn check_replay(&mut self, step: &AgentStepLog) -> Option<Alert> {
        if step.content.trim().chars().count() < self.core.config.min_replay_length {
            return None;
        }
        let hash = content_hash(&step.content);
        let first_sender = self
            .seen
            .entry(hash.clone())
            .or_insert_with(|| step.agent_name.clone());
        if *first_sender == step.agent_name {
            return None;
        }
        info!(agent = %step.agent_name, first_sender = %first_sender, "replayed message content");
        Some(
            Alert::new(
                Severity::Info,
                MESSAGE_TAMPERING,
                format!(
                    "'{}' sent content first seen from '{}'",
                    step.agent_name, first_sender
                ),
                RecommendedAction::Log,
            )
            .with_evidence("content_hash", hash)
            .with_evidence("first_sender", first_sender.clone())
            .with_evidence("agent", step.agent_name.clone()),
        )
    }
}

impl Monitor for MessageTamperingMonitor {
    fn risk_type(&self) -> &str {
        &self.core.risk_type
    }

    fn watches(&self, step: &AgentStepLog) -> bool {
        matches!(
            step.step_type,
            StepType::Receive | StepType::Text | StepType::Intercept
        )
    }

    fn process(&mut self, step: &AgentStepLog) -> Option<Alert> {
        if !self.watches(step) {
            return None;
        }
        if step.step_type == StepType::Intercept {
            let alert = self.check_intercept(step)?;
            return Some(self.core.record(alert));
        }
        if step.content.trim().is_empty() {
            return None;
        }

        let alert = match self.core.judge(step) {
            Judgment::Risk(result) => Some(alert_from_judgment(MESSAGE_TAMPERING, &result, step)),
            Judgment::Clear => None,
            Judgment::Unavailable if self.core.config.fallback_enabled => self.fallback(step),
            Judgment::Unavailable => None,
        };
        let replay = self.check_replay(step);
        alert.or(replay).map(|alert| self.core.record(alert))
    }

    fn alerts(&self) -> &[Alert] {
        &self.core.alerts
    }

    fn reset(&mut self) {
        self.core.reset();
        self.seen.clear();
        self.anomaly_counts.clear();
    }
}

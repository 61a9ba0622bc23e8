//! Heuristic judge built on the pattern library.

use warden_contracts::{
    error::WardenResult,
    judge::{JudgeContext, JudgeInfo, JudgeResult, RecommendedAction, Severity},
};
use warden_core::traits::Judge;

use crate::{
    patterns::{detect_anomalies, families, AnomalyThresholds, PatternLibrary},
    prompts::risk_label,
};

pub const PATTERN_JUDGE_TYPE: &str = "pattern";

/// Risk types judged with the injection library instead of the tampering one.
pub fn is_injection_risk(risk_type: &str) -> bool {
    risk_type.contains("prompt_injection") || risk_type.contains("jailbreak")
}

/// Default action for a fallback severity.
pub fn action_for(severity: Severity) -> RecommendedAction {
    match severity {
        Severity::Critical => RecommendedAction::Block,
        Severity::Warning => RecommendedAction::Warn,
        Severity::Info | Severity::None => RecommendedAction::Log,
    }
}

/// Deterministic judge: never unavailable, so `analyze` always returns `Some`.
#[derive(Debug)]
pub struct PatternJudge {
    risk_type: String,
    library: PatternLibrary,
    thresholds: AnomalyThresholds,
}

impl PatternJudge {
    pub fn for_risk(risk_type: impl Into<String>) -> WardenResult<Self> {
        let risk_type = risk_type.into();
        let library = if is_injection_risk(&risk_type) {
            PatternLibrary::injection()?
        } else {
            PatternLibrary::tampering()?
        };
        Ok(Self {
            risk_type,
            library,
            thresholds: AnomalyThresholds::default(),
        })
    }

    pub fn with_thresholds(mut self, thresholds: AnomalyThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

impl Judge for PatternJudge {
    fn analyze(&self, content: &str, _context: Option<&JudgeContext>) -> Option<JudgeResult> {
        let hits = self.library.scan(content);
        let anomalies = detect_anomalies(content, &self.thresholds);

        let mut severity = self.library.assess(&hits);
        if severity == Severity::None && !anomalies.is_empty() {
            severity = Severity::Warning;
        }
        if severity == Severity::None {
            return Some(JudgeResult::clear(
                PATTERN_JUDGE_TYPE,
                "no known signatures or anomalies",
            ));
        }

        let mut reasons = Vec::new();
        if !hits.is_empty() {
            let names: Vec<&str> = families(&hits).iter().map(|f| f.as_str()).collect();
            reasons.push(format!("matched {}", names.join(", ")));
        }
        if !anomalies.is_empty() {
            let kinds: Vec<&str> = anomalies.iter().map(|a| a.kind.as_str()).collect();
            reasons.push(format!("anomalies: {}", kinds.join(", ")));
        }

        let evidence = hits
            .iter()
            .map(|hit| hit.describe())
            .chain(
                anomalies
                    .iter()
                    .map(|a| format!("anomaly/{}: {}", a.kind, a.detail)),
            )
            .collect();

        Some(JudgeResult {
            has_risk: true,
            severity,
            reason: reasons.join("; "),
            evidence,
            recommended_action: action_for(severity),
            raw_response: None,
            judge_type: PATTERN_JUDGE_TYPE.to_string(),
        })
    }

    fn get_judge_info(&self) -> JudgeInfo {
        JudgeInfo {
            judge_type: PATTERN_JUDGE_TYPE.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: format!("signature and anomaly judge for {}", risk_label(&self.risk_type)),
        }
    }
}

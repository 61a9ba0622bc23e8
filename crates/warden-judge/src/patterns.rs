//! Deterministic detection patterns and anomaly heuristics.
//!
//! Used by `PatternJudge` and by the monitors' fallback path when the
//! primary judge cannot classify.

use std::{collections::BTreeSet, fmt};

use regex::Regex;
use serde::{Deserialize, Serialize};

use warden_contracts::{
    error::{WardenError, WardenResult},
    judge::Severity,
};

// ── Pattern families ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternFamily {
    SqlInjection,
    CommandInjection,
    Xss,
    MetadataOverride,
    InstructionOverride,
    Jailbreak,
}

impl PatternFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlInjection => "sql_injection",
            Self::CommandInjection => "command_injection",
            Self::Xss => "xss",
            Self::MetadataOverride => "metadata_override",
            Self::InstructionOverride => "instruction_override",
            Self::Jailbreak => "jailbreak",
        }
    }

    /// A single hit from these families is enough for `critical`.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::SqlInjection | Self::CommandInjection)
    }
}

impl fmt::Display for PatternFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SQL_PATTERNS: &[(&str, &str)] = &[
    ("drop_table", r"(?i)\bdrop\s+(table|database)\b"),
    ("stacked_statement", r"(?i);\s*(drop|delete|insert|update|truncate|alter)\s"),
    ("union_select", r"(?i)\bunion\s+(all\s+)?select\b"),
    ("tautology", r#"(?i)['"]?\s*\bor\s+['"]?1['"]?\s*=\s*['"]?1"#),
    ("trailing_comment", r"(?m);\s*--"),
    ("select_star", r"(?i)\bselect\s+\*\s+from\b"),
];

const COMMAND_PATTERNS: &[(&str, &str)] = &[
    ("chained_shell", r"(?i)(;|&&|\|\|)\s*(rm|cat|curl|wget|bash|sh|nc|chmod|python)\b"),
    ("recursive_delete", r"(?i)\brm\s+-(rf|fr)\b"),
    ("command_substitution", r"\$\([^)]+\)"),
    ("backtick_shell", r"(?i)`[^`\n]*\b(rm|curl|wget|nc|bash|sh|chmod)\b[^`\n]*`"),
    ("sensitive_path", r"(?i)/etc/(passwd|shadow)"),
    ("pipe_to_shell", r"(?i)\|\s*(ba)?sh\b"),
];

const XSS_PATTERNS: &[(&str, &str)] = &[
    ("script_tag", r"(?i)<\s*script\b"),
    ("javascript_url", r"(?i)javascript\s*:"),
    ("event_handler", r"(?i)\bon(error|load|click|mouseover|focus)\s*="),
    ("iframe_tag", r"(?i)<\s*iframe\b"),
];

const METADATA_PATTERNS: &[(&str, &str)] = &[
    ("role_override", r#"(?i)["']?\b(role|sender|from)["']?\s*[:=]\s*["']?(system|admin|root)\b"#),
    ("system_tag", r"(?i)\[\s*system\s*\]|<\s*/?\s*system\s*>"),
    ("header_injection", r"(?i)\bx-(agent|sender|role|priority)\s*:"),
];

const INSTRUCTION_PATTERNS: &[(&str, &str)] = &[
    ("ignore_previous", r"(?i)ignore\s+(all\s+)?(previous|prior|above)\s+(instructions?|prompts?|rules?)"),
    ("disregard_previous", r"(?i)disregard\s+(all\s+)?(previous|prior|your)\s+(instructions?|rules?|guidelines?)"),
    ("forget_everything", r"(?i)forget\s+(everything|all)\s+(you|that|above)"),
    ("new_instructions", r"(?i)new\s+(instructions?|system\s+prompt)\s*:"),
    ("override_instructions", r"(?i)override\s+(your|the|all)\s+(instructions?|rules?|programming)"),
    ("reveal_prompt", r"(?i)(reveal|print|show|repeat)\s+(your|the)\s+(system\s+)?(prompt|instructions)"),
];

const JAILBREAK_PATTERNS: &[(&str, &str)] = &[
    ("dan", r"\bDAN\b|(?i:do\s+anything\s+now)"),
    ("developer_mode", r"(?i)developer\s+mode"),
    ("persona_switch", r"(?i)you\s+are\s+now\s+(a|an|in)\s"),
    ("pretend", r"(?i)pretend\s+(you\s+are|to\s+be)"),
    ("no_restrictions", r"(?i)without\s+(any\s+)?(restrictions|filters|limits|guidelines)"),
    ("jailbreak_word", r"(?i)\bjailbreak"),
];

// ── Library ──────────────────────────────────────────────────────────────────

struct NamedPattern {
    family: PatternFamily,
    name: &'static str,
    regex: Regex,
}

/// One pattern that matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternHit {
    pub family: PatternFamily,
    pub name: String,
    pub matched: String,
}

impl PatternHit {
    /// `family/name: "matched text"`, used as alert evidence.
    pub fn describe(&self) -> String {
        format!("{}/{}: {:?}", self.family, self.name, self.matched)
    }
}

/// A compiled, ordered set of detection patterns.
pub struct PatternLibrary {
    patterns: Vec<NamedPattern>,
    /// Escalate to `critical` once this many distinct families hit.
    escalate_at_families: Option<usize>,
}

impl fmt::Debug for PatternLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternLibrary")
            .field("patterns", &self.patterns.len())
            .field("escalate_at_families", &self.escalate_at_families)
            .finish()
    }
}

impl PatternLibrary {
    fn compile(
        sets: &[(PatternFamily, &[(&'static str, &'static str)])],
        escalate_at_families: Option<usize>,
    ) -> WardenResult<Self> {
        let mut patterns = Vec::new();
        for (family, defs) in sets {
            for &(name, pattern) in defs.iter() {
                let regex = Regex::new(pattern).map_err(|e| WardenError::ConfigError {
                    reason: format!("failed to compile pattern '{}/{}': {}", family, name, e),
                })?;
                patterns.push(NamedPattern {
                    family: *family,
                    name,
                    regex,
                });
            }
        }
        Ok(Self {
            patterns,
            escalate_at_families,
        })
    }

    /// SQL, command, XSS and metadata-override signatures.
    pub fn tampering() -> WardenResult<Self> {
        Self::compile(
            &[
                (PatternFamily::SqlInjection, SQL_PATTERNS),
                (PatternFamily::CommandInjection, COMMAND_PATTERNS),
                (PatternFamily::Xss, XSS_PATTERNS),
                (PatternFamily::MetadataOverride, METADATA_PATTERNS),
            ],
            None,
        )
    }

    /// Instruction-override and jailbreak signatures.
    pub fn injection() -> WardenResult<Self> {
        Self::compile(
            &[
                (PatternFamily::InstructionOverride, INSTRUCTION_PATTERNS),
                (PatternFamily::Jailbreak, JAILBREAK_PATTERNS),
            ],
            Some(2),
        )
    }

    /// Every hit in pattern order; each pattern reports its first match only.
    pub fn scan(&self, content: &str) -> Vec<PatternHit> {
        self.patterns
            .iter()
            .filter_map(|p| {
                p.regex.find(content).map(|m| PatternHit {
                    family: p.family,
                    name: p.name.to_string(),
                    matched: m.as_str().to_string(),
                })
            })
            .collect()
    }

    /// `none` without hits, `critical` for critical families or enough
    /// distinct families, else `warning`.
    pub fn assess(&self, hits: &[PatternHit]) -> Severity {
        if hits.is_empty() {
            return Severity::None;
        }
        let families = families(hits);
        let escalated = self
            .escalate_at_families
            .is_some_and(|threshold| families.len() >= threshold);
        if escalated || families.iter().any(PatternFamily::is_critical) {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }
}

/// Distinct families among `hits`.
pub fn families(hits: &[PatternHit]) -> BTreeSet<PatternFamily> {
    hits.iter().map(|hit| hit.family).collect()
}

// ── Anomaly heuristics ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    NullBytes,
    SpecialCharDensity,
    LongLine,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NullBytes => "null_bytes",
            Self::SpecialCharDensity => "special_char_density",
            Self::LongLine => "long_line",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyThresholds {
    pub max_line_length: usize,
    /// Fraction of characters that are neither alphanumeric nor whitespace.
    pub special_char_ratio: f64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            max_line_length: 1000,
            special_char_ratio: 0.3,
        }
    }
}

/// Structural oddities that are suspicious regardless of wording.
pub fn detect_anomalies(content: &str, thresholds: &AnomalyThresholds) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    let nulls = content.chars().filter(|c| *c == '\0').count();
    if nulls > 0 {
        anomalies.push(Anomaly {
            kind: AnomalyKind::NullBytes,
            detail: format!("{nulls} null byte(s)"),
        });
    }

    let total = content.chars().count();
    if total > 0 {
        let special = content
            .chars()
            .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
            .count();
        let ratio = special as f64 / total as f64;
        if ratio > thresholds.special_char_ratio {
            anomalies.push(Anomaly {
                kind: AnomalyKind::SpecialCharDensity,
                detail: format!(
                    "{:.0}% special characters (limit {:.0}%)",
                    ratio * 100.0,
                    thresholds.special_char_ratio * 100.0
                ),
            });
        }
    }

    if let Some((index, line)) = content
        .lines()
        .enumerate()
        .find(|(_, line)| line.chars().count() > thresholds.max_line_length)
    {
        anomalies.push(Anomaly {
            kind: AnomalyKind::LongLine,
            detail: format!(
                "line {} has {} characters (limit {})",
                index + 1,
                line.chars().count(),
                thresholds.max_line_length
            ),
        });
    }

    anomalies
}

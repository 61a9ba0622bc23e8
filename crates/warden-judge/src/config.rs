//! TOML judge configuration.
//!
//! ```toml
//! prompt_dir = "prompts"
//! default_judge = "llm"
//!
//! [defaults]
//! temperature = 0.1
//! max_tokens = 500
//!
//! [risks.message_tampering]
//! max_tokens = 800
//! ```
//!
//! Every field is optional. Unknown top-level tables (such as `[monitor]`)
//! are ignored so one file can configure several crates.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use warden_contracts::error::{WardenError, WardenResult};

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    500
}

fn default_judge() -> String {
    "llm".to_string()
}

/// Sampling settings handed to the LLM client on every judge call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JudgeSettings {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl JudgeSettings {
    /// Reject values no LLM backend accepts.
    pub fn validate(&self) -> WardenResult<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(WardenError::ConfigError {
                reason: format!(
                    "judge temperature must be within [0, 2], got {}",
                    self.temperature
                ),
            });
        }
        if self.max_tokens == 0 {
            return Err(WardenError::ConfigError {
                reason: "judge max_tokens must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Per-risk overrides; unset fields inherit from `[defaults]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskOverride {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Directory holding `<risk_type>/system_prompt.txt` files.
    #[serde(default)]
    pub prompt_dir: Option<PathBuf>,

    /// Judge type used by `JudgeFactory::create_for_risk`.
    #[serde(default = "default_judge")]
    pub default_judge: String,

    #[serde(default)]
    pub defaults: JudgeSettings,

    #[serde(default)]
    pub risks: BTreeMap<String, RiskOverride>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            prompt_dir: None,
            default_judge: default_judge(),
            defaults: JudgeSettings::default(),
            risks: BTreeMap::new(),
        }
    }
}

impl JudgeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> WardenResult<Self> {
        let config: JudgeConfig = toml::from_str(s).map_err(|e| WardenError::ConfigError {
            reason: format!("failed to parse judge TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| WardenError::ConfigError {
            reason: format!("failed to read judge config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validate the defaults and the effective settings of every risk override.
    pub fn validate(&self) -> WardenResult<()> {
        self.defaults.validate()?;
        for risk_type in self.risks.keys() {
            self.settings_for(risk_type)
                .validate()
                .map_err(|e| WardenError::ConfigError {
                    reason: format!("[risks.{}]: {}", risk_type, e),
                })?;
        }
        Ok(())
    }

    /// Effective settings for `risk_type`.
    pub fn settings_for(&self, risk_type: &str) -> JudgeSettings {
        let mut settings = self.defaults;
        if let Some(overrides) = self.risks.get(risk_type) {
            if let Some(temperature) = overrides.temperature {
                settings.temperature = temperature;
            }
            if let Some(max_tokens) = overrides.max_tokens {
                settings.max_tokens = max_tokens;
            }
        }
        settings
    }
}

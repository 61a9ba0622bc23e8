//! Monitor configuration, read from the `[monitor]` table of the WARDEN TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use warden_contracts::error::{WardenError, WardenResult};
use warden_judge::AnomalyThresholds;

fn default_true() -> bool {
    true
}

fn default_max_line_length() -> usize {
    1000
}

fn default_special_char_ratio() -> f64 {
    0.3
}

fn default_min_replay_length() -> usize {
    20
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Run the pattern fallback when the judge cannot classify.
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    #[serde(default = "default_special_char_ratio")]
    pub special_char_ratio: f64,
    /// Shorter messages (trimmed, in characters) are not tracked for replays.
    #[serde(default = "default_min_replay_length")]
    pub min_replay_length: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            fallback_enabled: true,
            max_line_length: default_max_line_length(),
            special_char_ratio: default_special_char_ratio(),
            min_replay_length: default_min_replay_length(),
        }
    }
}

#[derive(Deserialize)]
struct MonitorSection {
    #[serde(default)]
    monitor: MonitorConfig,
}

impl MonitorConfig {
    /// Parse the `[monitor]` table of `s`; other tables are ignored.
    pub fn from_toml_str(s: &str) -> WardenResult<Self> {
        let section: MonitorSection = toml::from_str(s).map_err(|e| WardenError::ConfigError {
            reason: format!("failed to parse monitor TOML: {}", e),
        })?;
        section.monitor.validate()?;
        Ok(section.monitor)
    }

    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| WardenError::ConfigError {
            reason: format!("failed to read monitor config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> WardenResult<()> {
        if self.max_line_length == 0 {
            return Err(WardenError::ConfigError {
                reason: "monitor max_line_length must be greater than zero".to_string(),
            });
        }
        if !(self.special_char_ratio > 0.0 && self.special_char_ratio <= 1.0) {
            return Err(WardenError::ConfigError {
                reason: format!(
                    "monitor special_char_ratio must be within (0, 1], got {}",
                    self.special_char_ratio
                ),
            });
        }
        Ok(())
    }

    pub fn thresholds(&self) -> AnomalyThresholds {
        AnomalyThresholds {
            max_line_length: self.max_line_length,
            special_char_ratio: self.special_char_ratio,
        }
    }
}

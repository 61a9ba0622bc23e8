//! String-keyed judge registry.
//!
//! Every constructor registered here has the same signature and returns a
//! `Box<dyn Judge>`, so the interface is checked when the constructor is
//! registered rather than when a judge is created. `"llm"` and `"pattern"`
//! are registered by `JudgeFactory::new`.

use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, info, warn};

use warden_contracts::error::{WardenError, WardenResult};
use warden_core::traits::{Judge, LlmClient};

use crate::{
    config::{JudgeConfig, JudgeSettings},
    llm::{LlmJudge, LLM_JUDGE_TYPE},
    pattern_judge::{PatternJudge, PATTERN_JUDGE_TYPE},
    prompts::{default_system_prompt, load_system_prompt},
};

/// Everything a constructor needs to build a judge for one risk type.
#[derive(Clone)]
pub struct JudgeRequest {
    pub risk_type: String,
    pub system_prompt: String,
    pub settings: JudgeSettings,
    pub client: Option<Arc<dyn LlmClient>>,
}

pub type JudgeConstructor =
    Box<dyn Fn(&JudgeRequest) -> WardenResult<Box<dyn Judge>> + Send + Sync>;

pub struct JudgeFactory {
    constructors: BTreeMap<String, JudgeConstructor>,
    config: JudgeConfig,
    client: Option<Arc<dyn LlmClient>>,
}

impl JudgeFactory {
    /// A factory with the built-in judge types and no LLM client.
    pub fn new(config: JudgeConfig) -> Self {
        let mut factory = Self {
            constructors: BTreeMap::new(),
            config,
            client: None,
        };
        factory.insert(LLM_JUDGE_TYPE, Box::new(build_llm_judge));
        factory.insert(PATTERN_JUDGE_TYPE, Box::new(build_pattern_judge));
        factory
    }

    /// Client handed to every judge this factory creates.
    pub fn with_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    fn insert(&mut self, judge_type: &str, constructor: JudgeConstructor) {
        self.constructors.insert(judge_type.to_string(), constructor);
    }

    /// Register `constructor` under `judge_type`, replacing any previous entry.
    pub fn register(
        &mut self,
        judge_type: impl Into<String>,
        constructor: JudgeConstructor,
    ) -> WardenResult<()> {
        let judge_type = judge_type.into();
        if judge_type.trim().is_empty() {
            return Err(WardenError::ConfigError {
                reason: "judge type must not be empty".to_string(),
            });
        }
        if self.constructors.contains_key(&judge_type) {
            warn!(judge_type = %judge_type, "replacing registered judge constructor");
        } else {
            info!(judge_type = %judge_type, "registered judge constructor");
        }
        self.insert(&judge_type, constructor);
        Ok(())
    }

    /// Registered type names, sorted.
    pub fn available_types(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Build a `judge_type` judge for `risk_type` with the generic prompt.
    pub fn create(&self, judge_type: &str, risk_type: &str) -> WardenResult<Box<dyn Judge>> {
        self.build(judge_type, risk_type, default_system_prompt(risk_type))
    }

    /// Build the configured default judge for `risk_type`, loading its prompt
    /// file from `prompt_dir` when one exists.
    pub fn create_for_risk(&self, risk_type: &str) -> WardenResult<Box<dyn Judge>> {
        let prompt = load_system_prompt(self.config.prompt_dir.as_deref(), risk_type);
        self.build(&self.config.default_judge, risk_type, prompt)
    }

    fn build(
        &self,
        judge_type: &str,
        risk_type: &str,
        system_prompt: String,
    ) -> WardenResult<Box<dyn Judge>> {
        let constructor =
            self.constructors
                .get(judge_type)
                .ok_or_else(|| WardenError::UnknownJudgeType {
                    judge_type: judge_type.to_string(),
                    available: self.available_types(),
                })?;
        let request = JudgeRequest {
            risk_type: risk_type.to_string(),
            system_prompt,
            settings: self.config.settings_for(risk_type),
            client: self.client.clone(),
        };
        let judge = constructor(&request)?;
        debug!(judge_type = %judge_type, risk_type = %risk_type, "judge created");
        Ok(judge)
    }
}

fn build_llm_judge(request: &JudgeRequest) -> WardenResult<Box<dyn Judge>> {
    let client = request.client.clone().ok_or_else(|| WardenError::ConfigError {
        reason: format!(
            "judge type '{}' for risk '{}' requires an LLM client",
            LLM_JUDGE_TYPE, request.risk_type
        ),
    })?;
    Ok(Box::new(LlmJudge::new(
        client,
        request.risk_type.clone(),
        &request.system_prompt,
        request.settings,
    )?))
}

fn build_pattern_judge(request: &JudgeRequest) -> WardenResult<Box<dyn Judge>> {
    Ok(Box::new(PatternJudge::for_risk(request.risk_type.clone())?))
}

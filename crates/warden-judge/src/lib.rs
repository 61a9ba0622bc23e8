//! # warden-judge
//!
//! Risk classification for WARDEN monitors.
//!
//! - [`LlmJudge`] asks an LLM for a JSON verdict and parses it leniently:
//!   fenced responses are unwrapped, out-of-set enums are coerced, and any
//!   failure is reported as `None` ("could not judge").
//! - [`PatternJudge`] applies the deterministic signature and anomaly library
//!   that monitors also use as their fallback.
//! - [`JudgeFactory`] maps judge type names to constructors and builds judges
//!   per risk type from a TOML [`JudgeConfig`].
//!
//! ```rust,ignore
//! let config = JudgeConfig::from_file(Path::new("warden.toml"))?;
//! let factory = JudgeFactory::new(config).with_client(client);
//! let judge = factory.create_for_risk("message_tampering")?;
//! ```

pub mod config;
pub mod factory;
pub mod llm;
pub mod parse;
pub mod pattern_judge;
pub mod patterns;
pub mod prompts;

pub use config::{JudgeConfig, JudgeSettings};
pub use factory::{JudgeConstructor, JudgeFactory, JudgeRequest};
pub use llm::LlmJudge;
pub use pattern_judge::PatternJudge;
pub use patterns::{AnomalyThresholds, PatternLibrary};

// ── Tests ─────────────────────────────────────────────────────────────────────

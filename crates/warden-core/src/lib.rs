//! # warden-core
//!
//! The runtime interception and monitoring pipeline for WARDEN.
//!
//! This crate provides:
//! - The seam traits (`MessageSender`, `AgentFramework`, `MultiAgentSystem`,
//!   `TraceWriter`, `LlmClient`, `Judge`)
//! - `HookRegistry` and `InterceptingSender`, which capture every send
//! - `MasWrapper`, the `MultiAgentSystem` over any `AgentFramework`
//! - The workflow runners (`BasicRunner`, `InterceptingRunner`,
//!   `MonitoredRunner`, `CombinedRunner`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_core::{MasWrapper, runner::{MonitoredRunner, WorkflowRunner}};
//!
//! let mas = Arc::new(MasWrapper::new(framework));
//! let runner = MonitoredRunner::new(mas, writer);
//! let result = runner.run("Summarize Q3 filings", &RunOptions::default())?;
//! ```
//!
//! One workflow at a time per `MasWrapper`: the hook list and message history
//! are shared by every agent of the wrapper and are not run-scoped.

pub mod hooks;
pub mod interception;
pub mod mas;
pub mod runner;
pub mod sender;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use interception::{InterceptionEvent, MessageInterception};
pub use mas::MasWrapper;

//! Workflow runners: the strategies that drive one workflow execution.
//!
//! Every runner follows the same pipeline:
//!
//!   prepare task → register hooks → MAS::run_workflow → clear hooks → finish result
//!
//! Hooks are held by a `HookScope` whose `Drop` clears them, so they are
//! released on every exit path, including `?` returns and panics.
//!
//! - `BasicRunner`        — no hooks, pre/post transforms only
//! - `InterceptingRunner` — rewrites matching messages in transit
//! - `MonitoredRunner`    — records every message into a trace
//! - `CombinedRunner`     — interception first, then monitoring

mod combined;
mod intercepting;
mod monitored;

use std::sync::Arc;

use tracing::debug;

use warden_contracts::{
    error::WardenResult,
    workflow::{RunOptions, WorkflowResult},
};

use crate::traits::{MessageHook, MultiAgentSystem};

pub use combined::CombinedRunner;
pub use intercepting::InterceptingRunner;
pub use monitored::{MessageLogger, MonitoredRunner, StepCallback};

/// Pre-run transform applied to the task text.
pub type TaskTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Post-run transform applied to the workflow result.
pub type ResultTransform = Arc<dyn Fn(WorkflowResult) -> WorkflowResult + Send + Sync>;

/// State every runner carries: the MAS it drives plus its transforms.
#[derive(Clone)]
pub struct RunnerCore {
    mas: Arc<dyn MultiAgentSystem>,
    task_transform: Option<TaskTransform>,
    result_transform: Option<ResultTransform>,
}

impl RunnerCore {
    pub fn new(mas: Arc<dyn MultiAgentSystem>) -> Self {
        Self { mas, task_transform: None, result_transform: None }
    }

    pub fn with_task_transform<T>(mut self, transform: T) -> Self
    where
        T: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.task_transform = Some(Arc::new(transform));
        self
    }

    pub fn with_result_transform<T>(mut self, transform: T) -> Self
    where
        T: Fn(WorkflowResult) -> WorkflowResult + Send + Sync + 'static,
    {
        self.result_transform = Some(Arc::new(transform));
        self
    }

    pub fn mas(&self) -> &dyn MultiAgentSystem {
        self.mas.as_ref()
    }

    pub fn prepare_task(&self, task: &str) -> String {
        match &self.task_transform {
            Some(transform) => transform(task),
            None => task.to_string(),
        }
    }

    pub fn finish_result(&self, result: WorkflowResult) -> WorkflowResult {
        match &self.result_transform {
            Some(transform) => transform(result),
            None => result,
        }
    }
}

/// Registers a hook on construction and clears the MAS's hooks on drop.
pub struct HookScope<'a> {
    mas: &'a dyn MultiAgentSystem,
}

impl<'a> HookScope<'a> {
    pub fn acquire(mas: &'a dyn MultiAgentSystem, hook: Option<MessageHook>) -> WardenResult<Self> {
        // Construct the guard first: a failed registration still clears.
        let scope = Self { mas };
        if let Some(hook) = hook {
            mas.register_message_hook(hook)?;
        }
        Ok(scope)
    }
}

impl Drop for HookScope<'_> {
    fn drop(&mut self) {
        self.mas.clear_message_hooks();
        debug!("hook scope released");
    }
}

/// A strategy for running one workflow against a MAS.
pub trait WorkflowRunner {
    fn core(&self) -> &RunnerCore;

    /// The hook this runner threads through every send, if any.
    fn message_hook(&self) -> Option<MessageHook> {
        None
    }

    /// Run `task` to completion.
    ///
    /// State machine: idle → hooks-registered → executing →
    /// (success | error) → hooks-cleared → terminal.
    fn run(&self, task: &str, options: &RunOptions) -> WardenResult<WorkflowResult> {
        let core = self.core();
        let task = core.prepare_task(task);
        let result = {
            let _hooks = HookScope::acquire(core.mas(), self.message_hook())?;
            core.mas().run_workflow(&task, options)?
        };
        Ok(core.finish_result(result))
    }
}

/// Pure pass-through runner: no hooks.
#[derive(Clone)]
pub struct BasicRunner {
    core: RunnerCore,
}

impl BasicRunner {
    pub fn new(mas: Arc<dyn MultiAgentSystem>) -> Self {
        Self { core: RunnerCore::new(mas) }
    }

    pub fn with_task_transform<T>(mut self, transform: T) -> Self
    where
        T: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.core = self.core.with_task_transform(transform);
        self
    }

    pub fn with_result_transform<T>(mut self, transform: T) -> Self
    where
        T: Fn(WorkflowResult) -> WorkflowResult + Send + Sync + 'static,
    {
        self.core = self.core.with_result_transform(transform);
        self
    }
}

impl WorkflowRunner for BasicRunner {
    fn core(&self) -> &RunnerCore {
        &self.core
    }
}

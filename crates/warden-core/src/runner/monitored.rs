use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use warden_contracts::{
    agent::TraceId,
    error::WardenResult,
    message::HookMessage,
    trace::{AgentStepLog, StepType, Trace},
    workflow::{RunOptions, WorkflowResult},
};

use crate::{
    interception::InterceptionEvent,
    traits::{MessageHook, MultiAgentSystem, TraceWriter},
};

use super::{HookScope, RunnerCore, WorkflowRunner};

/// Streaming callback invoked with each step right after it is logged.
pub type StepCallback = Arc<dyn Fn(&AgentStepLog) + Send + Sync>;

/// The logging half of monitoring, shared by the monitored and combined hooks.
///
/// Never mutates message content.
#[derive(Clone)]
pub struct MessageLogger {
    writer: Arc<dyn TraceWriter>,
    on_step: Option<StepCallback>,
}

impl MessageLogger {
    pub fn new(writer: Arc<dyn TraceWriter>, on_step: Option<StepCallback>) -> Self {
        Self { writer, on_step }
    }

    /// Log one message as a message-log entry plus one step.
    pub fn on_message(&self, message: HookMessage) -> HookMessage {
        let message_type = message.message_type();
        let content = step_content(&message, message_type);

        let mut metadata = Map::new();
        metadata.insert("from".to_string(), json!(message.from));
        metadata.insert("to".to_string(), json!(message.to));
        metadata.insert("message_type".to_string(), json!(message_type));
        if let Some(name) = &message.name {
            metadata.insert("name".to_string(), json!(name));
        }
        if let Some(role) = &message.role {
            metadata.insert("role".to_string(), json!(role));
        }
        if message.is_rerouted() {
            metadata.insert("logical_to".to_string(), json!(message.to));
            metadata.insert("physical_to".to_string(), json!(message.physical_to));
        }

        if let Err(err) = self.writer.log_message(
            message.from.as_str(),
            message.to.as_str(),
            message.content.as_deref(),
            message_type,
        ) {
            warn!(error = %err, from = %message.from, "failed to write message log entry");
        }

        self.write_step(message.from.as_str(), message_type, &content, metadata);
        message
    }

    /// Log one interception rewrite as its own `intercept` step.
    pub fn log_interception(&self, event: &InterceptionEvent) {
        let mut metadata = Map::new();
        metadata.insert("original_content".to_string(), json!(event.original));
        metadata.insert("modified_content".to_string(), json!(event.modified));
        metadata.insert("source_agent".to_string(), json!(event.source));
        metadata.insert("target_agent".to_string(), json!(event.target));
        metadata.insert("rule_index".to_string(), json!(event.rule_index));

        self.write_step(event.source.as_str(), StepType::Intercept, &event.modified, metadata);
    }

    fn write_step(&self, agent: &str, step_type: StepType, content: &str, metadata: Map<String, Value>) {
        match self.writer.log_agent_step(agent, step_type, content, metadata) {
            Ok(step) => {
                if let Some(callback) = &self.on_step {
                    callback(&step);
                }
            }
            Err(err) => warn!(error = %err, agent = %agent, "failed to write agent step"),
        }
    }
}

/// The text recorded for a step: the content, or the structured payload
/// that made the message a tool/function step.
fn step_content(message: &HookMessage, message_type: StepType) -> String {
    let structured = match message_type {
        StepType::ToolCall => serde_json::to_string(&message.tool_calls).ok(),
        StepType::ToolResponse => serde_json::to_string(&message.tool_responses).ok(),
        StepType::FunctionCall => serde_json::to_string(&message.function_call).ok(),
        _ => None,
    };
    match (message.content.as_deref(), structured) {
        (Some(content), _) if !content.trim().is_empty() => content.to_string(),
        (_, Some(structured)) => structured,
        (content, None) => content.unwrap_or_default().to_string(),
    }
}

/// Ends the current trace on drop unless `finish` was called first.
struct TraceScope<'a> {
    writer: &'a dyn TraceWriter,
    finished: bool,
}

impl<'a> TraceScope<'a> {
    fn open(writer: &'a dyn TraceWriter, task: &str) -> WardenResult<(Self, TraceId)> {
        let trace_id = writer.start_trace(task)?;
        Ok((Self { writer, finished: false }, trace_id))
    }

    fn finish(mut self, success: bool, error: Option<String>) -> WardenResult<Trace> {
        self.finished = true;
        self.writer.end_trace(success, error)
    }
}

impl Drop for TraceScope<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self
            .writer
            .end_trace(false, Some("trace scope dropped before completion".to_string()))
        {
            warn!(error = %err, "failed to close abandoned trace");
        }
    }
}

/// Records every message of a workflow into a trace.
#[derive(Clone)]
pub struct MonitoredRunner {
    core: RunnerCore,
    writer: Arc<dyn TraceWriter>,
    on_step: Option<StepCallback>,
}

impl MonitoredRunner {
    pub fn new(mas: Arc<dyn MultiAgentSystem>, writer: Arc<dyn TraceWriter>) -> Self {
        Self { core: RunnerCore::new(mas), writer, on_step: None }
    }

    /// Stream each logged step to `callback` as it happens.
    pub fn with_step_callback<C>(mut self, callback: C) -> Self
    where
        C: Fn(&AgentStepLog) + Send + Sync + 'static,
    {
        self.on_step = Some(Arc::new(callback));
        self
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

    pub fn writer(&self) -> &Arc<dyn TraceWriter> {
        &self.writer
    }

    pub fn logger(&self) -> MessageLogger {
        MessageLogger::new(self.writer.clone(), self.on_step.clone())
    }

    pub fn on_message(&self, message: HookMessage) -> HookMessage {
        self.logger().on_message(message)
    }

    /// Run with an explicit hook. Shared with `CombinedRunner`.
    ///
    /// The trace is always closed. On success or a captured failure the
    /// sealed trace is attached to the result metadata; when the MAS itself
    /// errors the trace is closed with that error and the error is returned.
    pub(crate) fn run_with_hook(
        &self,
        task: &str,
        options: &RunOptions,
        hook: MessageHook,
    ) -> WardenResult<WorkflowResult> {
        let task = self.core.prepare_task(task);
        let (trace_scope, trace_id) = TraceScope::open(self.writer.as_ref(), &task)?;
        info!(trace_id = %trace_id, "monitored workflow starting");

        // The scope is dropped when the closure returns, before the trace closes.
        let outcome = HookScope::acquire(self.core.mas(), Some(hook))
            .and_then(|_hooks| self.core.mas().run_workflow(&task, options));

        match outcome {
            Ok(mut result) => {
                let trace = trace_scope.finish(result.success, result.error.clone())?;
                info!(
                    trace_id = %trace_id,
                    success = result.success,
                    steps = trace.agent_steps.len(),
                    "monitored workflow finished"
                );
                attach_trace(&mut result, &trace);
                Ok(self.core.finish_result(result))
            }
            Err(err) => {
                match trace_scope.finish(false, Some(err.to_string())) {
                    Ok(trace) => warn!(
                        trace_id = %trace_id,
                        error = %err,
                        steps = trace.agent_steps.len(),
                        "workflow raised; trace closed with partial logs"
                    ),
                    Err(end_err) => warn!(error = %end_err, "failed to close trace after workflow error"),
                }
                Err(err)
            }
        }
    }
}

fn attach_trace(result: &mut WorkflowResult, trace: &Trace) {
    result
        .metadata
        .insert("trace_id".to_string(), json!(trace.trace_id.to_string()));
    match serde_json::to_value(trace) {
        Ok(value) => {
            result.metadata.insert("trace".to_string(), value);
        }
        Err(err) => warn!(error = %err, "failed to attach trace to result"),
    }
}

impl WorkflowRunner for MonitoredRunner {
    fn core(&self) -> &RunnerCore {
        &self.core
    }

    fn message_hook(&self) -> Option<MessageHook> {
        let logger = self.logger();
        Some(Arc::new(move |message| logger.on_message(message)))
    }

    fn run(&self, task: &str, options: &RunOptions) -> WardenResult<WorkflowResult> {
        let logger = self.logger();
        self.run_with_hook(task, options, Arc::new(move |message| logger.on_message(message)))
    }
}

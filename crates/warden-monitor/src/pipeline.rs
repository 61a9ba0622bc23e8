//! Drives a set of monitors over trace steps.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use warden_contracts::{
    agent::TraceId,
    alert::Alert,
    trace::{AgentStepLog, Trace},
};
use warden_trace::StructuredLogWriter;

use crate::base::Monitor;

/// Every registered monitor sees every step exactly once, in trace order.
#[derive(Default)]
pub struct MonitorPipeline {
    monitors: Vec<Box<dyn Monitor>>,
    cursor: Option<(TraceId, usize)>,
    alerts: Vec<Alert>,
}

impl MonitorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_monitor(mut self, monitor: Box<dyn Monitor>) -> Self {
        self.add(monitor);
        self
    }

    pub fn add(&mut self, monitor: Box<dyn Monitor>) {
        self.monitors.push(monitor);
    }

    pub fn monitors(&self) -> &[Box<dyn Monitor>] {
        &self.monitors
    }

    /// Alerts from every monitor, in emission order.
    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn process_step(&mut self, step: &AgentStepLog) -> Vec<Alert> {
        let raised: Vec<Alert> = self
            .monitors
            .iter_mut()
            .filter_map(|monitor| monitor.process(step))
            .collect();
        self.alerts.extend(raised.iter().cloned());
        raised
    }

    pub fn process_steps(&mut self, steps: &[AgentStepLog]) -> Vec<Alert> {
        steps
            .iter()
            .flat_map(|step| self.process_step(step))
            .collect()
    }

    /// Run the monitors over a finished trace, e.g. one loaded from disk.
    pub fn process_trace(&mut self, trace: &Trace) -> Vec<Alert> {
        debug!(trace_id = %trace.trace_id, steps = trace.agent_steps.len(), "replaying trace through monitors");
        self.process_steps(&trace.agent_steps)
    }

    /// Process the steps `writer` recorded since the previous poll.
    ///
    /// When the writer has moved on to another trace, the rest of the
    /// previously polled trace is processed first, then any traces sealed in
    /// between, then the current trace from its first step.
    pub fn poll(&mut self, writer: &StructuredLogWriter) -> Vec<Alert> {
        let from = self.cursor.map(|(_, index)| index).unwrap_or(0);
        let Some(mut batch) = writer.steps_since(from) else {
            return Vec::new();
        };
        let mut alerts = Vec::new();
        if let Some((previous, index)) = self.cursor.filter(|(id, _)| *id != batch.trace_id) {
            alerts.extend(self.drain_sealed(writer, previous, index, batch.trace_id));
            if batch.start > 0 {
                match writer.steps_since(0) {
                    Some(fresh) => batch = fresh,
                    None => return alerts,
                }
            }
        }
        alerts.extend(self.process_steps(&batch.steps));
        self.cursor = Some((batch.trace_id, batch.start + batch.steps.len()));
        alerts
    }

    /// Finish `previous` from `index`, then every trace sealed after it and
    /// before `current`.
    fn drain_sealed(
        &mut self,
        writer: &StructuredLogWriter,
        previous: TraceId,
        index: usize,
        current: TraceId,
    ) -> Vec<Alert> {
        let completed = writer.completed_traces();
        let Some(position) = completed.iter().position(|t| t.trace_id == previous) else {
            return Vec::new();
        };
        let unread = completed[position].agent_steps.get(index..).unwrap_or_default();
        let mut alerts = self.process_steps(unread);
        for skipped in completed[position + 1..]
            .iter()
            .take_while(|t| t.trace_id != current)
        {
            debug!(trace_id = %skipped.trace_id, "polling trace sealed between polls");
            alerts.extend(self.process_steps(&skipped.agent_steps));
        }
        alerts
    }

    /// Clear every monitor and the pipeline's own alert log and cursor.
    pub fn reset(&mut self) {
        for monitor in &mut self.monitors {
            monitor.reset();
        }
        self.alerts.clear();
        self.cursor = None;
    }

    /// A step callback for `MonitoredRunner` that feeds steps to `pipeline`
    /// as they are logged.
    pub fn step_callback(
        pipeline: Arc<Mutex<MonitorPipeline>>,
    ) -> impl Fn(&AgentStepLog) + Send + Sync + 'static {
        move |step: &AgentStepLog| {
            pipeline
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .process_step(step);
        }
    }
}

//! In-memory implementation of `TraceWriter`.
//!
//! `StructuredLogWriter` keeps the current trace and every completed trace
//! behind a `Mutex`, so the hooks installed on each agent and the runner that
//! owns the writer can share it through an `Arc`.
//!
//! Step timestamps are seconds since the trace started, taken from a
//! monotonic clock and clamped so they never decrease within a trace.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use warden_contracts::{
    agent::TraceId,
    error::{WardenError, WardenResult},
    trace::{AgentStepLog, MessageLogEntry, StepType, Trace},
};
use warden_core::traits::TraceWriter;

use crate::session::LogSession;

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct OpenTrace {
    pub(crate) trace: Trace,
    origin: Instant,
    last_timestamp: f64,
}

impl OpenTrace {
    fn next_timestamp(&mut self) -> f64 {
        let now = self.origin.elapsed().as_secs_f64().max(self.last_timestamp);
        self.last_timestamp = now;
        now
    }
}

#[derive(Default)]
pub(crate) struct WriterState {
    pub(crate) current: Option<OpenTrace>,
    pub(crate) completed: Vec<Trace>,
}

/// A batch of steps read incrementally from a writer.
#[derive(Debug, Clone, PartialEq)]
pub struct StepBatch {
    pub trace_id: TraceId,
    /// Position of the first step in `steps` within its trace.
    pub start: usize,
    pub steps: Vec<AgentStepLog>,
    /// True when the trace has already been sealed.
    pub sealed: bool,
}

// ── Public writer ─────────────────────────────────────────────────────────────

/// Accumulates steps into one current trace at a time.
#[derive(Default)]
pub struct StructuredLogWriter {
    pub(crate) state: Arc<Mutex<WriterState>>,
    session: Option<Arc<LogSession>>,
}

impl StructuredLogWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist every sealed trace into `session` as well as keeping it in memory.
    pub fn with_session(session: Arc<LogSession>) -> Self {
        Self {
            state: Arc::default(),
            session: Some(session),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_trace_id(&self) -> Option<TraceId> {
        self.lock().current.as_ref().map(|open| open.trace.trace_id)
    }

    /// Snapshot of the open trace, if any.
    pub fn current_trace(&self) -> Option<Trace> {
        self.lock().current.as_ref().map(|open| open.trace.clone())
    }

    /// Steps of the open trace so far.
    pub fn steps(&self) -> Vec<AgentStepLog> {
        self.lock()
            .current
            .as_ref()
            .map(|open| open.trace.agent_steps.clone())
            .unwrap_or_default()
    }

    /// Steps appended at or after `cursor` in the open trace, or in the most
    /// recently sealed trace when none is open.
    pub fn steps_since(&self, cursor: usize) -> Option<StepBatch> {
        let state = self.lock();
        let (trace, sealed) = match (&state.current, state.completed.last()) {
            (Some(open), _) => (&open.trace, false),
            (None, Some(trace)) => (trace, true),
            (None, None) => return None,
        };
        Some(StepBatch {
            trace_id: trace.trace_id,
            start: cursor.min(trace.agent_steps.len()),
            steps: trace.agent_steps.iter().skip(cursor).cloned().collect(),
            sealed,
        })
    }

    /// The most recently sealed trace.
    pub fn last_trace(&self) -> Option<Trace> {
        self.lock().completed.last().cloned()
    }

    pub fn completed_traces(&self) -> Vec<Trace> {
        self.lock().completed.clone()
    }

    fn with_open<T>(&self, f: impl FnOnce(&mut OpenTrace) -> T) -> WardenResult<T> {
        let mut state = self.lock();
        let open = state.current.as_mut().ok_or_else(|| WardenError::TraceError {
            reason: "no trace is open; call start_trace first".to_string(),
        })?;
        Ok(f(open))
    }
}

// ── TraceWriter impl ──────────────────────────────────────────────────────────

impl TraceWriter for StructuredLogWriter {
    fn start_trace(&self, task: &str) -> WardenResult<TraceId> {
        let mut state = self.lock();
        if let Some(open) = &state.current {
            return Err(WardenError::TraceError {
                reason: format!("trace {} is still open", open.trace.trace_id),
            });
        }
        let trace = Trace::new(task);
        let trace_id = trace.trace_id;
        state.current = Some(OpenTrace {
            trace,
            origin: Instant::now(),
            last_timestamp: 0.0,
        });
        info!(trace_id = %trace_id, "trace started");
        Ok(trace_id)
    }

    fn log_message(
        &self,
        from: &str,
        to: &str,
        content: Option<&str>,
        message_type: StepType,
    ) -> WardenResult<()> {
        self.with_open(|open| {
            let timestamp = open.next_timestamp();
            open.trace.messages.push(MessageLogEntry {
                timestamp,
                from: from.to_string(),
                to: to.to_string(),
                content: content.map(str::to_string),
                message_type,
            });
        })
    }

    fn log_agent_step(
        &self,
        agent_name: &str,
        step_type: StepType,
        content: &str,
        metadata: Map<String, Value>,
    ) -> WardenResult<AgentStepLog> {
        self.with_open(|open| {
            let step = AgentStepLog {
                timestamp: open.next_timestamp(),
                agent_name: agent_name.to_string(),
                step_type,
                content: content.to_string(),
                metadata,
            };
            open.trace.agent_steps.push(step.clone());
            debug!(agent = %agent_name, step_type = %step_type, index = open.trace.agent_steps.len() - 1, "step logged");
            step
        })
    }

    fn end_trace(&self, success: bool, error: Option<String>) -> WardenResult<Trace> {
        let trace = {
            let mut state = self.lock();
            let open = state.current.take().ok_or_else(|| WardenError::TraceError {
                reason: "no trace is open to end".to_string(),
            })?;
            let mut trace = open.trace;
            trace.success = success;
            trace.error = error;
            trace.ended_at = Some(Utc::now());
            state.completed.push(trace.clone());
            trace
        };

        info!(
            trace_id = %trace.trace_id,
            success = trace.success,
            steps = trace.agent_steps.len(),
            messages = trace.messages.len(),
            "trace ended"
        );

        if let Some(session) = &self.session {
            if let Err(err) = session.save_trace(&trace) {
                warn!(trace_id = %trace.trace_id, error = %err, "failed to persist trace to session");
            }
        }
        Ok(trace)
    }
}

//! Test doubles shared by the core unit tests.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use serde_json::{json, Map, Value};

use warden_contracts::{
    agent::{AgentId, AgentInfo, TraceId},
    error::{WardenError, WardenResult},
    message::{MessagePayload, SendOptions},
    trace::{AgentStepLog, MessageLogEntry, StepType, Trace},
    workflow::RunOptions,
};

use crate::traits::{AgentFramework, MessageSender, Topology, TraceWriter};

pub(crate) type Delivered = Arc<Mutex<Vec<(AgentId, AgentId, MessagePayload)>>>;

/// The framework's own send: records what reached the transport.
struct TransportSender {
    owner: AgentId,
    delivered: Delivered,
    fail_to: Option<AgentId>,
}

impl MessageSender for TransportSender {
    fn send(&self, payload: MessagePayload, recipient: &AgentId, _options: &SendOptions) -> WardenResult<()> {
        if self.fail_to.as_ref() == Some(recipient) {
            return Err(WardenError::SendFailed {
                reason: format!("{} unreachable", recipient),
            });
        }
        self.delivered
            .lock()
            .unwrap()
            .push((self.owner.clone(), recipient.clone(), payload));
        Ok(())
    }
}

pub(crate) struct Turn {
    from: AgentId,
    to: AgentId,
    payload: MessagePayload,
}

impl Turn {
    pub(crate) fn new(from: &str, to: &str, payload: MessagePayload) -> Self {
        Self { from: AgentId::new(from), to: AgentId::new(to), payload }
    }

    pub(crate) fn text(from: &str, to: &str, content: &str) -> Self {
        Self::new(from, to, MessagePayload::text(content))
    }
}

/// A scripted framework: `execute` replays `turns` through each sender.
pub(crate) struct MockFramework {
    names: Vec<AgentId>,
    senders: Mutex<BTreeMap<AgentId, Arc<dyn MessageSender>>>,
    turns: Vec<Turn>,
    router: Option<AgentId>,
    /// `replace_sender` fails for this agent while set.
    reject_replace: Mutex<Option<AgentId>>,
    pub(crate) delivered: Delivered,
}

impl MockFramework {
    pub(crate) fn new(names: &[&str]) -> Self {
        let delivered: Delivered = Arc::new(Mutex::new(Vec::new()));
        Self::build(names, delivered, None)
    }

    fn build(names: &[&str], delivered: Delivered, fail_to: Option<AgentId>) -> Self {
        let names: Vec<AgentId> = names.iter().map(|n| AgentId::new(*n)).collect();
        let senders = names
            .iter()
            .map(|id| {
                let sender: Arc<dyn MessageSender> = Arc::new(TransportSender {
                    owner: id.clone(),
                    delivered: delivered.clone(),
                    fail_to: fail_to.clone(),
                });
                (id.clone(), sender)
            })
            .collect();
        Self {
            names,
            senders: Mutex::new(senders),
            turns: Vec::new(),
            router: None,
            reject_replace: Mutex::new(None),
            delivered,
        }
    }

    pub(crate) fn with_turn(mut self, turn: Turn) -> Self {
        self.turns.push(turn);
        self
    }

    pub(crate) fn with_router(mut self, router: &str) -> Self {
        self.router = Some(AgentId::new(router));
        self
    }

    pub(crate) fn reject_replace_of(&self, agent: Option<&str>) {
        *self.reject_replace.lock().unwrap() = agent.map(AgentId::new);
    }

    pub(crate) fn failing_delivery_to(self, recipient: &str) -> Self {
        let names: Vec<&str> = self.names.iter().map(|n| n.as_str()).collect();
        let mut rebuilt = Self::build(&names, self.delivered.clone(), Some(AgentId::new(recipient)));
        rebuilt.turns = self.turns;
        rebuilt.router = self.router;
        rebuilt
    }
}

impl AgentFramework for MockFramework {
    fn agents(&self) -> Vec<AgentInfo> {
        self.names
            .iter()
            .map(|id| AgentInfo { id: id.clone(), description: String::new(), llm_enabled: false })
            .collect()
    }

    fn sender(&self, agent: &AgentId) -> Option<Arc<dyn MessageSender>> {
        self.senders.lock().unwrap().get(agent).cloned()
    }

    fn replace_sender(&self, agent: &AgentId, sender: Arc<dyn MessageSender>) -> WardenResult<()> {
        if self.reject_replace.lock().unwrap().as_ref() == Some(agent) {
            return Err(WardenError::ConfigError {
                reason: format!("sender slot for '{}' is locked", agent),
            });
        }
        self.senders.lock().unwrap().insert(agent.clone(), sender);
        Ok(())
    }

    fn router(&self) -> Option<AgentId> {
        self.router.clone()
    }

    fn topology(&self) -> Topology {
        self.names
            .iter()
            .map(|id| (id.clone(), self.names.iter().filter(|n| *n != id).cloned().collect()))
            .collect()
    }

    fn execute(&self, task: &str, _options: &RunOptions) -> WardenResult<Value> {
        for turn in &self.turns {
            let sender = self.sender(&turn.from).ok_or_else(|| WardenError::AgentNotFound {
                name: turn.from.0.clone(),
                available: vec![],
            })?;
            sender.send(turn.payload.clone(), &turn.to, &SendOptions::default())?;
        }
        Ok(json!({ "task": task, "turns": self.turns.len() }))
    }
}

/// A trace writer that records every call for later inspection.
#[derive(Default)]
pub(crate) struct RecordingTraceWriter {
    pub(crate) current: Mutex<Option<Trace>>,
    pub(crate) ended: Mutex<Vec<Trace>>,
    pub(crate) end_calls: Mutex<u32>,
}

impl TraceWriter for RecordingTraceWriter {
    fn start_trace(&self, task: &str) -> WardenResult<TraceId> {
        let trace = Trace::new(task);
        let id = trace.trace_id;
        *self.current.lock().unwrap() = Some(trace);
        Ok(id)
    }

    fn log_message(&self, from: &str, to: &str, content: Option<&str>, message_type: StepType) -> WardenResult<()> {
        let mut current = self.current.lock().unwrap();
        let trace = current.as_mut().ok_or_else(|| WardenError::TraceError {
            reason: "no trace open".to_string(),
        })?;
        trace.messages.push(MessageLogEntry {
            timestamp: trace.messages.len() as f64,
            from: from.to_string(),
            to: to.to_string(),
            content: content.map(str::to_string),
            message_type,
        });
        Ok(())
    }

    fn log_agent_step(
        &self,
        agent_name: &str,
        step_type: StepType,
        content: &str,
        metadata: Map<String, Value>,
    ) -> WardenResult<AgentStepLog> {
        let mut current = self.current.lock().unwrap();
        let trace = current.as_mut().ok_or_else(|| WardenError::TraceError {
            reason: "no trace open".to_string(),
        })?;
        let step = AgentStepLog {
            timestamp: trace.agent_steps.len() as f64,
            agent_name: agent_name.to_string(),
            step_type,
            content: content.to_string(),
            metadata,
        };
        trace.agent_steps.push(step.clone());
        Ok(step)
    }

    fn end_trace(&self, success: bool, error: Option<String>) -> WardenResult<Trace> {
        *self.end_calls.lock().unwrap() += 1;
        let mut trace = self.current.lock().unwrap().take().ok_or_else(|| WardenError::TraceError {
            reason: "no trace open".to_string(),
        })?;
        trace.success = success;
        trace.error = error;
        trace.ended_at = Some(chrono::Utc::now());
        self.ended.lock().unwrap().push(trace.clone());
        Ok(trace)
    }
}

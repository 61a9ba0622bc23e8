//! `ScriptedChat`: a deterministic in-memory conversation framework.
//!
//! Agents exchange a fixed list of turns. A turn either sends a scripted
//! payload or asks the sending agent's LLM to reply to the last message in
//! its inbox. When a group-chat manager is configured, every send travels
//! through it, so the manager is the physical recipient while the scripted
//! `to` stays the logical one.
//!
//! Each agent's send capability lives in a replaceable slot, which is what
//! `MasWrapper` needs to install its interceptors.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde_json::{json, Value};
use tracing::{debug, info};

use warden_contracts::{
    agent::{AgentId, AgentInfo},
    error::{WardenError, WardenResult},
    message::{MessagePayload, SendOptions, StructuredMessage},
    workflow::RunOptions,
};
use warden_core::traits::{AgentFramework, LlmClient, MessageSender, Topology};

/// Rounds run when the caller does not pass `max_rounds`.
pub const DEFAULT_MAX_ROUNDS: u32 = 10;

const REPLY_TEMPERATURE: f32 = 0.0;
const REPLY_MAX_TOKENS: u32 = 256;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn find_agent<'a>(agents: &'a [ChatAgent], id: &AgentId) -> WardenResult<&'a ChatAgent> {
    agents
        .iter()
        .find(|agent| &agent.id == id)
        .ok_or_else(|| WardenError::AgentNotFound {
            name: id.to_string(),
            available: agents.iter().map(|a| a.id.to_string()).collect(),
        })
}

// ── Agents and turns ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ChatAgent {
    pub id: AgentId,
    pub description: String,
    pub llm_enabled: bool,
    pub system_message: String,
    /// Tools this agent may call.
    pub tools: Vec<String>,
}

impl ChatAgent {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            id: AgentId::new(name),
            description: description.to_string(),
            llm_enabled: false,
            system_message: String::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_llm(mut self, system_message: &str) -> Self {
        self.llm_enabled = true;
        self.system_message = system_message.to_string();
        self
    }

    pub fn with_tool(mut self, tool: &str) -> Self {
        self.tools.push(tool.to_string());
        self
    }

    fn info(&self) -> AgentInfo {
        AgentInfo {
            id: self.id.clone(),
            description: self.description.clone(),
            llm_enabled: self.llm_enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnKind {
    /// Send this payload. `{task}` in text content is replaced by the task.
    Say(MessagePayload),
    /// Ask the sender's LLM to answer the last message in its inbox.
    Reply,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedTurn {
    pub from: AgentId,
    pub to: AgentId,
    pub kind: TurnKind,
}

impl ScriptedTurn {
    pub fn say(from: &str, to: &str, content: &str) -> Self {
        Self::payload(from, to, MessagePayload::text(content))
    }

    pub fn payload(from: &str, to: &str, payload: MessagePayload) -> Self {
        Self {
            from: AgentId::new(from),
            to: AgentId::new(to),
            kind: TurnKind::Say(payload),
        }
    }

    /// A structured message carrying one tool call and no content.
    pub fn tool_call(from: &str, to: &str, call_id: &str, tool: &str, arguments: Value) -> Self {
        Self::payload(
            from,
            to,
            MessagePayload::Structured(StructuredMessage {
                tool_calls: vec![json!({
                    "id": call_id,
                    "type": "function",
                    "function": { "name": tool, "arguments": arguments.to_string() }
                })],
                role: Some("assistant".to_string()),
                ..StructuredMessage::default()
            }),
        )
    }

    pub fn tool_response(from: &str, to: &str, call_id: &str, output: &str) -> Self {
        Self::payload(
            from,
            to,
            MessagePayload::Structured(StructuredMessage {
                content: Some(output.to_string()),
                tool_responses: vec![json!({ "tool_call_id": call_id, "content": output })],
                role: Some("tool".to_string()),
                ..StructuredMessage::default()
            }),
        )
    }

    pub fn reply(from: &str, to: &str) -> Self {
        Self {
            from: AgentId::new(from),
            to: AgentId::new(to),
            kind: TurnKind::Reply,
        }
    }

    /// Tool names this turn calls.
    fn called_tools(&self) -> Vec<String> {
        match &self.kind {
            TurnKind::Say(MessagePayload::Structured(msg)) => msg
                .tool_calls
                .iter()
                .filter_map(|call| call["function"]["name"].as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

// ── Transport ────────────────────────────────────────────────────────────────

/// A message as it landed in a recipient's inbox.
#[derive(Debug, Clone, PartialEq)]
pub struct InboxMessage {
    pub from: AgentId,
    pub payload: MessagePayload,
    /// The manager the message was relayed through, if any.
    pub via: Option<AgentId>,
}

type Inboxes = Arc<Mutex<BTreeMap<AgentId, Vec<InboxMessage>>>>;

/// The framework's own send: delivers into the recipient's inbox.
struct ChatTransport {
    owner: AgentId,
    members: Arc<BTreeSet<AgentId>>,
    inboxes: Inboxes,
    manager: Option<AgentId>,
}

impl MessageSender for ChatTransport {
    fn send(
        &self,
        payload: MessagePayload,
        recipient: &AgentId,
        options: &SendOptions,
    ) -> WardenResult<()> {
        if !self.members.contains(recipient) {
            return Err(WardenError::SendFailed {
                reason: format!("'{}' cannot deliver to unknown agent '{}'", self.owner, recipient),
            });
        }
        if !options.silent {
            debug!(from = %self.owner, to = %recipient, via = ?self.manager, "delivering message");
        }
        lock(&self.inboxes)
            .entry(recipient.clone())
            .or_default()
            .push(InboxMessage {
                from: self.owner.clone(),
                payload,
                via: self.manager.clone(),
            });
        Ok(())
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedChatBuilder {
    agents: Vec<ChatAgent>,
    manager: Option<AgentId>,
    turns: Vec<ScriptedTurn>,
    llm: Option<Arc<dyn LlmClient>>,
}

impl ScriptedChatBuilder {
    pub fn agent(mut self, agent: ChatAgent) -> Self {
        self.agents.push(agent);
        self
    }

    /// Route every send through a group-chat manager named `name`.
    pub fn manager(mut self, name: &str) -> Self {
        self.manager = Some(AgentId::new(name));
        self
    }

    pub fn turn(mut self, turn: ScriptedTurn) -> Self {
        self.turns.push(turn);
        self
    }

    /// LLM backing every LLM-enabled agent's `Reply` turns.
    pub fn llm(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(client);
        self
    }

    /// Validate the script and build the framework.
    ///
    /// Fails with `ConfigError` when an agent is declared twice, when a turn
    /// needs an LLM (a reply or a tool call) but its sender is not LLM-enabled,
    /// when a tool is called that the sender does not declare, or when replies
    /// are scripted without an LLM client. Unknown agents in turns fail with
    /// `AgentNotFound`.
    pub fn build(self) -> WardenResult<ScriptedChat> {
        let mut members = BTreeSet::new();
        for agent in &self.agents {
            if !members.insert(agent.id.clone()) {
                return Err(WardenError::ConfigError {
                    reason: format!("agent '{}' is declared twice", agent.id),
                });
            }
        }
        if let Some(manager) = &self.manager {
            if members.contains(manager) {
                return Err(WardenError::ConfigError {
                    reason: format!("manager '{}' must not also be a chat agent", manager),
                });
            }
        }

        for turn in &self.turns {
            let sender = find_agent(&self.agents, &turn.from)?;
            find_agent(&self.agents, &turn.to)?;

            let tools = turn.called_tools();
            let needs_llm = matches!(turn.kind, TurnKind::Reply) || !tools.is_empty();
            if needs_llm && !sender.llm_enabled {
                return Err(WardenError::ConfigError {
                    reason: format!(
                        "agent '{}' replies or calls tools but is not LLM-enabled",
                        sender.id
                    ),
                });
            }
            if let Some(tool) = tools.iter().find(|tool| !sender.tools.contains(tool)) {
                return Err(WardenError::ConfigError {
                    reason: format!("agent '{}' calls undeclared tool '{}'", sender.id, tool),
                });
            }
            if matches!(turn.kind, TurnKind::Reply) && self.llm.is_none() {
                return Err(WardenError::ConfigError {
                    reason: format!(
                        "agent '{}' has scripted replies but no LLM client is configured",
                        sender.id
                    ),
                });
            }
        }

        let members = Arc::new(members);
        let inboxes: Inboxes = Arc::default();
        let senders = self
            .agents
            .iter()
            .map(|agent| {
                let transport: Arc<dyn MessageSender> = Arc::new(ChatTransport {
                    owner: agent.id.clone(),
                    members: Arc::clone(&members),
                    inboxes: Arc::clone(&inboxes),
                    manager: self.manager.clone(),
                });
                (agent.id.clone(), transport)
            })
            .collect();

        info!(
            agents = self.agents.len(),
            turns = self.turns.len(),
            manager = ?self.manager,
            "scripted chat ready"
        );
        Ok(ScriptedChat {
            agents: self.agents,
            senders: Mutex::new(senders),
            inboxes,
            manager: self.manager,
            turns: self.turns,
            llm: self.llm,
        })
    }
}

// ── Framework ────────────────────────────────────────────────────────────────

pub struct ScriptedChat {
    agents: Vec<ChatAgent>,
    senders: Mutex<BTreeMap<AgentId, Arc<dyn MessageSender>>>,
    inboxes: Inboxes,
    manager: Option<AgentId>,
    turns: Vec<ScriptedTurn>,
    llm: Option<Arc<dyn LlmClient>>,
}

impl ScriptedChat {
    pub fn builder() -> ScriptedChatBuilder {
        ScriptedChatBuilder::default()
    }

    /// Everything delivered to `agent` so far, in delivery order.
    pub fn inbox(&self, agent: &str) -> Vec<InboxMessage> {
        lock(&self.inboxes)
            .get(&AgentId::new(agent))
            .cloned()
            .unwrap_or_default()
    }

    pub fn clear_inboxes(&self) {
        lock(&self.inboxes).clear();
    }

    fn payload_for(&self, turn: &ScriptedTurn, task: &str) -> WardenResult<MessagePayload> {
        match &turn.kind {
            TurnKind::Say(MessagePayload::Text(text)) => {
                Ok(MessagePayload::text(text.replace("{task}", task)))
            }
            TurnKind::Say(payload) => Ok(payload.clone()),
            TurnKind::Reply => {
                let agent = find_agent(&self.agents, &turn.from)?;
                let llm = self.llm.as_ref().ok_or_else(|| WardenError::ConfigError {
                    reason: format!("agent '{}' needs an LLM client to reply", agent.id),
                })?;
                let prompt = lock(&self.inboxes)
                    .get(&agent.id)
                    .and_then(|inbox| inbox.last())
                    .and_then(|last| last.payload.content().map(str::to_string))
                    .unwrap_or_else(|| task.to_string());
                let reply = llm.generate_with_system(
                    &agent.system_message,
                    &prompt,
                    REPLY_TEMPERATURE,
                    REPLY_MAX_TOKENS,
                )?;
                Ok(MessagePayload::text(reply))
            }
        }
    }
}

impl AgentFramework for ScriptedChat {
    fn agents(&self) -> Vec<AgentInfo> {
        self.agents.iter().map(ChatAgent::info).collect()
    }

    fn sender(&self, agent: &AgentId) -> Option<Arc<dyn MessageSender>> {
        lock(&self.senders).get(agent).cloned()
    }

    fn replace_sender(&self, agent: &AgentId, sender: Arc<dyn MessageSender>) -> WardenResult<()> {
        let mut senders = lock(&self.senders);
        let slot = senders.get_mut(agent).ok_or_else(|| WardenError::AgentNotFound {
            name: agent.to_string(),
            available: self.agents.iter().map(|a| a.id.to_string()).collect(),
        })?;
        *slot = sender;
        Ok(())
    }

    fn router(&self) -> Option<AgentId> {
        self.manager.clone()
    }

    /// With a manager every agent talks only to it; otherwise the edges are
    /// the scripted sender → recipient pairs.
    fn topology(&self) -> Topology {
        let mut topology: Topology = self
            .agents
            .iter()
            .map(|agent| (agent.id.clone(), Vec::new()))
            .collect();
        match &self.manager {
            Some(manager) => {
                for neighbours in topology.values_mut() {
                    neighbours.push(manager.clone());
                }
                topology.insert(
                    manager.clone(),
                    self.agents.iter().map(|a| a.id.clone()).collect(),
                );
            }
            None => {
                for turn in &self.turns {
                    let neighbours = topology.entry(turn.from.clone()).or_default();
                    if !neighbours.contains(&turn.to) {
                        neighbours.push(turn.to.clone());
                    }
                }
            }
        }
        topology
    }

    fn execute(&self, task: &str, options: &RunOptions) -> WardenResult<Value> {
        let max_rounds = options.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS) as usize;
        let rounds = self.turns.len().min(max_rounds);
        let mut last_message = None;

        for (index, turn) in self.turns.iter().take(rounds).enumerate() {
            let payload = self.payload_for(turn, task)?;
            last_message = payload.content().map(str::to_string);
            let sender = self.sender(&turn.from).ok_or_else(|| WardenError::AgentNotFound {
                name: turn.from.to_string(),
                available: self.agents.iter().map(|a| a.id.to_string()).collect(),
            })?;
            let send_options = SendOptions {
                request_reply: Some(index + 1 < rounds),
                silent: false,
            };
            sender.send(payload, &turn.to, &send_options)?;
        }

        if rounds < self.turns.len() {
            info!(rounds, scripted = self.turns.len(), "conversation stopped at max_rounds");
        }
        Ok(json!({
            "task": task,
            "rounds": rounds,
            "completed": rounds == self.turns.len(),
            "last_message": last_message,
        }))
    }
}

//! The interceptable sender wrapped around every managed agent.
//!
//! `InterceptingSender` implements `MessageSender` itself, so it can replace
//! the framework's own send capability in place. Per send it:
//!
//!   normalize → build hook-message (from, logical to, physical to)
//!   → hook chain → rebuild original shape → forward → record history

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use warden_contracts::{
    agent::AgentId,
    error::WardenResult,
    message::{HookMessage, MessagePayload, MessageRecord, SendOptions},
};

use crate::{hooks::HookRegistry, traits::MessageSender};

pub struct InterceptingSender {
    agent: AgentId,
    inner: Arc<dyn MessageSender>,
    registry: HookRegistry,
    router: Option<AgentId>,
}

impl InterceptingSender {
    /// Wrap `inner`, the original send capability of `agent`.
    ///
    /// `router` is the transport intermediary every send physically goes
    /// through, if the framework has one.
    pub fn new(
        agent: AgentId,
        inner: Arc<dyn MessageSender>,
        registry: HookRegistry,
        router: Option<AgentId>,
    ) -> Self {
        Self { agent, inner, registry, router }
    }

    pub fn agent(&self) -> &AgentId {
        &self.agent
    }
}

impl MessageSender for InterceptingSender {
    fn send(
        &self,
        payload: MessagePayload,
        recipient: &AgentId,
        options: &SendOptions,
    ) -> WardenResult<()> {
        let message = HookMessage::new(self.agent.clone(), recipient.clone(), payload.normalize())
            .with_physical_to(self.router.clone());

        let message = self.registry.apply(message);

        debug!(
            from = %self.agent,
            to = %recipient,
            rerouted = message.is_rerouted(),
            "forwarding intercepted message"
        );

        let content = message.content;
        let forwarded = payload.with_content(content.clone());
        let outcome = self.inner.send(forwarded, recipient, options);

        // History is kept whether or not the transport accepted the message.
        self.registry.record(MessageRecord {
            from: self.agent.clone(),
            to: recipient.clone(),
            content,
            timestamp: Utc::now(),
        });

        outcome
    }
}

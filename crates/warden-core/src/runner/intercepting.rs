use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use warden_contracts::message::HookMessage;

use crate::{
    interception::{apply_interceptions, InterceptionEvent, MessageInterception},
    traits::{MessageHook, MultiAgentSystem},
};

use super::{RunnerCore, WorkflowRunner};

/// Rewrites matching messages in transit according to its rule list.
#[derive(Clone)]
pub struct InterceptingRunner {
    core: RunnerCore,
    interceptions: Vec<MessageInterception>,
    events: Arc<Mutex<Vec<InterceptionEvent>>>,
}

impl InterceptingRunner {
    pub fn new(mas: Arc<dyn MultiAgentSystem>, interceptions: Vec<MessageInterception>) -> Self {
        Self {
            core: RunnerCore::new(mas),
            interceptions,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_task_transform<T>(mut self, transform: T) -> Self
    where
        T: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.core = self.core.with_task_transform(transform);
        self
    }

    pub fn add_interception(&mut self, interception: MessageInterception) {
        self.interceptions.push(interception);
    }

    pub fn interceptions(&self) -> &[MessageInterception] {
        &self.interceptions
    }

    /// Every rewrite performed so far, across runs.
    pub fn events(&self) -> Vec<InterceptionEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Apply all matching rules to one message.
    pub fn on_message(&self, message: HookMessage) -> HookMessage {
        intercept(&self.interceptions, &self.events, message)
    }
}

fn intercept(
    rules: &[MessageInterception],
    sink: &Mutex<Vec<InterceptionEvent>>,
    message: HookMessage,
) -> HookMessage {
    let (message, events) = apply_interceptions(rules, message);
    for event in &events {
        info!(
            source = %event.source,
            target = %event.target,
            rule_index = event.rule_index,
            "message intercepted"
        );
    }
    sink.lock().unwrap_or_else(PoisonError::into_inner).extend(events);
    message
}

impl WorkflowRunner for InterceptingRunner {
    fn core(&self) -> &RunnerCore {
        &self.core
    }

    fn message_hook(&self) -> Option<MessageHook> {
        let rules = Arc::new(self.interceptions.clone());
        let events = self.events.clone();
        Some(Arc::new(move |message| intercept(&rules, &events, message)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use warden_contracts::{agent::AgentId, message::MessagePayload, workflow::RunOptions};

    use crate::{
        interception::MessageInterception,
        mas::MasWrapper,
        runner::WorkflowRunner,
        testing::{MockFramework, Turn},
    };

    use super::InterceptingRunner;

    #[test]
    fn wildcard_rule_rewrites_every_message_from_source() {
        let framework = MockFramework::new(&["A", "B", "C"])
            .with_turn(Turn::text("A", "B", "compute 5+3"))
            .with_turn(Turn::text("B", "A", "8"))
            .with_turn(Turn::text("A", "C", "report 8"));
        let delivered = framework.delivered.clone();
        let mas = Arc::new(MasWrapper::new(framework));

        let runner = InterceptingRunner::new(
            mas.clone(),
            vec![MessageInterception::new("A", |c| format!("{c} [MODIFIED]"))],
        );
        let result = runner.run("task", &RunOptions::default()).unwrap();

        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered[0].2, MessagePayload::text("compute 5+3 [MODIFIED]"));
        assert_eq!(delivered[1].2, MessagePayload::text("8"));
        assert_eq!(delivered[2].2, MessagePayload::text("report 8 [MODIFIED]"));

        // The logged history carries the rewritten content.
        let from_a: Vec<_> = result
            .messages
            .iter()
            .filter(|m| m.from == AgentId::new("A"))
            .collect();
        assert!(from_a.iter().all(|m| m.content.as_deref().unwrap().ends_with(" [MODIFIED]")));
        assert_eq!(runner.events().len(), 2);
    }

    #[test]
    fn hooks_are_cleared_after_run() {
        let framework = MockFramework::new(&["A", "B"]).with_turn(Turn::text("A", "B", "x"));
        let mas = Arc::new(MasWrapper::new(framework));
        let runner = InterceptingRunner::new(
            mas.clone(),
            vec![MessageInterception::new("A", |c| c.to_string())],
        );

        runner.run("task", &RunOptions::default()).unwrap();

        assert!(mas.registry().is_empty());
        assert!(mas.interceptors_installed());
    }

    #[test]
    fn routed_messages_match_on_logical_target() {
        let framework = MockFramework::new(&["A", "B"])
            .with_router("chat_manager")
            .with_turn(Turn::text("A", "B", "x"));
        let delivered = framework.delivered.clone();
        let mas = Arc::new(MasWrapper::new(framework));
        let runner = InterceptingRunner::new(
            mas,
            vec![MessageInterception::new("A", |c| format!("{c}!")).to("B")],
        );

        runner.run("task", &RunOptions::default()).unwrap();

        assert_eq!(delivered.lock().unwrap()[0].2, MessagePayload::text("x!"));
    }
}

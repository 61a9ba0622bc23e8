//! `MasWrapper`: the `MultiAgentSystem` implementation over any framework.
//!
//! The wrapper owns the hook registry. The first `register_message_hook`
//! call installs an `InterceptingSender` on every agent; the installed flag
//! is per wrapper, so later registrations never double-wrap.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use warden_contracts::{
    agent::{AgentId, AgentInfo},
    error::{WardenError, WardenResult},
    message::{HookMessage, MessageRecord},
    workflow::{RunOptions, WorkflowResult},
};

use crate::{
    hooks::HookRegistry,
    sender::InterceptingSender,
    traits::{AgentFramework, AgentHandle, MessageHook, MessageSender, MultiAgentSystem, Topology},
};

pub struct MasWrapper<F> {
    framework: Arc<F>,
    registry: HookRegistry,
    installed: Mutex<bool>,
}

impl<F: AgentFramework> MasWrapper<F> {
    pub fn new(framework: F) -> Self {
        Self::from_arc(Arc::new(framework))
    }

    pub fn from_arc(framework: Arc<F>) -> Self {
        Self {
            framework,
            registry: HookRegistry::new(),
            installed: Mutex::new(false),
        }
    }

    pub fn framework(&self) -> &Arc<F> {
        &self.framework
    }

    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    /// Every message observed by the interceptors so far.
    pub fn message_history(&self) -> Vec<MessageRecord> {
        self.registry.history()
    }

    /// Fold `message` through the currently registered hooks.
    pub fn apply_hooks(&self, message: HookMessage) -> HookMessage {
        self.registry.apply(message)
    }

    pub fn interceptors_installed(&self) -> bool {
        *self.installed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wrap every agent's send capability. Idempotent per wrapper.
    pub fn install_interceptors(&self) -> WardenResult<()> {
        let mut installed = self.installed.lock().unwrap_or_else(PoisonError::into_inner);
        if *installed {
            return Ok(());
        }

        // Resolve every sender before replacing any, so a missing agent
        // leaves the framework untouched.
        let agents = self.framework.agents();
        let mut originals: Vec<(AgentId, Arc<dyn MessageSender>)> = Vec::with_capacity(agents.len());
        for agent in &agents {
            let sender = self.framework.sender(&agent.id).ok_or_else(|| WardenError::AgentNotFound {
                name: agent.id.0.clone(),
                available: agent_names(&agents),
            })?;
            originals.push((agent.id.clone(), sender));
        }

        let router = self.framework.router();
        let mut replaced: Vec<(AgentId, Arc<dyn MessageSender>)> = Vec::with_capacity(originals.len());
        for (agent, original) in originals {
            let wrapped = InterceptingSender::new(
                agent.clone(),
                Arc::clone(&original),
                self.registry.clone(),
                router.clone(),
            );
            if let Err(err) = self.framework.replace_sender(&agent, Arc::new(wrapped)) {
                warn!(agent = %agent, error = %err, "interceptor installation failed; restoring original senders");
                self.restore_senders(replaced);
                return Err(err);
            }
            debug!(agent = %agent, "send interceptor installed");
            replaced.push((agent, original));
        }

        *installed = true;
        info!(agent_count = agents.len(), router = ?router, "message interceptors installed");
        Ok(())
    }

    /// Put back senders replaced by a partial installation, so a retry never
    /// wraps an agent twice.
    fn restore_senders(&self, replaced: Vec<(AgentId, Arc<dyn MessageSender>)>) {
        for (agent, original) in replaced {
            if let Err(err) = self.framework.replace_sender(&agent, original) {
                warn!(agent = %agent, error = %err, "could not restore original sender");
            }
        }
    }
}

fn agent_names(agents: &[AgentInfo]) -> Vec<String> {
    agents.iter().map(|a| a.id.0.clone()).collect()
}

impl<F: AgentFramework> MultiAgentSystem for MasWrapper<F> {
    fn get_agents(&self) -> Vec<AgentInfo> {
        self.framework.agents()
    }

    fn get_agent(&self, name: &str) -> WardenResult<AgentHandle> {
        let agents = self.framework.agents();
        let info = agents
            .iter()
            .find(|a| a.id.as_str() == name)
            .cloned()
            .ok_or_else(|| WardenError::AgentNotFound {
                name: name.to_string(),
                available: agent_names(&agents),
            })?;
        let sender = self.framework.sender(&info.id).ok_or_else(|| WardenError::AgentNotFound {
            name: name.to_string(),
            available: agent_names(&agents),
        })?;
        Ok(AgentHandle { info, sender })
    }

    fn run_workflow(&self, task: &str, options: &RunOptions) -> WardenResult<WorkflowResult> {
        let history_start = self.registry.history_len();
        info!(max_rounds = ?options.max_rounds, hook_count = self.registry.len(), "running workflow");

        let mut result = match self.framework.execute(task, options) {
            Ok(output) => WorkflowResult::succeeded(output),
            Err(err) => {
                warn!(error = %err, "workflow execution failed");
                WorkflowResult::failed(err.to_string())
            }
        };
        result.messages = self.registry.history_since(history_start);
        Ok(result)
    }

    fn get_topology(&self) -> Topology {
        self.framework.topology()
    }

    fn register_message_hook(&self, hook: MessageHook) -> WardenResult<()> {
        self.install_interceptors()?;
        self.registry.register(hook);
        Ok(())
    }

    fn clear_message_hooks(&self) {
        self.registry.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use warden_contracts::{
        agent::AgentId,
        error::WardenError,
        message::{HookMessage, MessagePayload, StructuredMessage},
        workflow::RunOptions,
    };

    use crate::{
        testing::{MockFramework, Turn},
        traits::{AgentFramework, MultiAgentSystem},
    };

    use super::MasWrapper;

    fn tag_hook(tag: &'static str) -> crate::traits::MessageHook {
        Arc::new(move |mut msg: HookMessage| {
            msg.content = msg.content.map(|c| format!("{c}{tag}"));
            msg
        })
    }

    #[test]
    fn unhooked_wrapper_does_not_alter_delivery() {
        let framework = MockFramework::new(&["a", "b"]).with_turn(Turn::text("a", "b", "hello"));
        let delivered = framework.delivered.clone();
        let mas = MasWrapper::new(framework);

        let result = mas.run_workflow("task", &RunOptions::default()).unwrap();

        assert!(result.success);
        assert!(!mas.interceptors_installed());
        assert_eq!(delivered.lock().unwrap()[0].2, MessagePayload::text("hello"));
    }

    #[test]
    fn first_registration_installs_once() {
        let framework = MockFramework::new(&["a", "b"]).with_turn(Turn::text("a", "b", "x"));
        let delivered = framework.delivered.clone();
        let mas = MasWrapper::new(framework);

        mas.register_message_hook(tag_hook("-1")).unwrap();
        mas.register_message_hook(tag_hook("-2")).unwrap();
        assert!(mas.interceptors_installed());

        mas.run_workflow("task", &RunOptions::default()).unwrap();

        // Double wrapping would apply the chain twice: "x-1-2-1-2".
        assert_eq!(delivered.lock().unwrap()[0].2, MessagePayload::text("x-1-2"));
    }

    #[test]
    fn failed_installation_restores_senders_and_retry_wraps_once() {
        let framework = MockFramework::new(&["a", "b"]).with_turn(Turn::text("a", "b", "x"));
        let delivered = framework.delivered.clone();
        let original_a = framework.sender(&AgentId::new("a")).unwrap();
        framework.reject_replace_of(Some("b"));
        let mas = MasWrapper::new(framework);

        assert!(mas.register_message_hook(tag_hook("-1")).is_err());
        assert!(!mas.interceptors_installed());
        let current_a = mas.framework().sender(&AgentId::new("a")).unwrap();
        assert!(Arc::ptr_eq(&current_a, &original_a));

        mas.framework().reject_replace_of(None);
        mas.register_message_hook(tag_hook("-2")).unwrap();
        mas.run_workflow("task", &RunOptions::default()).unwrap();

        // The failed registration never reached the registry.
        assert_eq!(delivered.lock().unwrap()[0].2, MessagePayload::text("x-2"));
    }

    #[test]
    fn cleared_hooks_leave_passthrough_interceptors() {
        let framework = MockFramework::new(&["a", "b"]).with_turn(Turn::text("a", "b", "x"));
        let delivered = framework.delivered.clone();
        let mas = MasWrapper::new(framework);

        mas.register_message_hook(tag_hook("!")).unwrap();
        mas.clear_message_hooks();
        let result = mas.run_workflow("task", &RunOptions::default()).unwrap();

        assert!(mas.interceptors_installed());
        assert_eq!(delivered.lock().unwrap()[0].2, MessagePayload::text("x"));
        // History is still recorded by the pass-through interceptor.
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].from, AgentId::new("a"));
    }

    #[test]
    fn structured_shape_survives_the_hook_chain() {
        let payload = MessagePayload::Structured(StructuredMessage {
            content: Some("draft".to_string()),
            role: Some("assistant".to_string()),
            ..StructuredMessage::default()
        });
        let framework = MockFramework::new(&["a", "b"]).with_turn(Turn::new("a", "b", payload));
        let delivered = framework.delivered.clone();
        let mas = MasWrapper::new(framework);
        mas.register_message_hook(tag_hook("+")).unwrap();

        mas.run_workflow("task", &RunOptions::default()).unwrap();

        match &delivered.lock().unwrap()[0].2 {
            MessagePayload::Structured(msg) => {
                assert_eq!(msg.content.as_deref(), Some("draft+"));
                assert_eq!(msg.role.as_deref(), Some("assistant"));
            }
            other => panic!("expected structured payload, got {:?}", other),
        };
    }

    #[test]
    fn hooks_see_logical_and_physical_recipients() {
        let framework = MockFramework::new(&["a", "b"])
            .with_router("chat_manager")
            .with_turn(Turn::text("a", "b", "x"));
        let mas = MasWrapper::new(framework);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        mas.register_message_hook(Arc::new(move |msg: HookMessage| {
            sink.lock().unwrap().push((msg.to.clone(), msg.physical_to.clone()));
            msg
        }))
        .unwrap();

        mas.run_workflow("task", &RunOptions::default()).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, AgentId::new("b"));
        assert_eq!(seen[0].1, Some(AgentId::new("chat_manager")));
    }

    #[test]
    fn send_failure_is_captured_as_failed_result_and_still_recorded() {
        let framework = MockFramework::new(&["a", "b"])
            .failing_delivery_to("b")
            .with_turn(Turn::text("a", "b", "x"));
        let mas = MasWrapper::new(framework);
        mas.register_message_hook(tag_hook("")).unwrap();

        let result = mas.run_workflow("task", &RunOptions::default()).unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("send failed"));
        assert_eq!(result.messages.len(), 1);
    }

    #[test]
    fn intercepted_send_propagates_transport_error_unchanged() {
        let framework = MockFramework::new(&["a", "b"]).failing_delivery_to("b");
        let mas = MasWrapper::new(framework);
        mas.register_message_hook(tag_hook("")).unwrap();

        let handle = mas.get_agent("a").unwrap();
        let err = handle
            .sender
            .send(MessagePayload::text("x"), &AgentId::new("b"), &Default::default())
            .unwrap_err();
        assert!(matches!(err, WardenError::SendFailed { .. }));
    }

    #[test]
    fn unknown_agent_lists_alternatives() {
        let mas = MasWrapper::new(MockFramework::new(&["planner", "coder"]));
        match mas.get_agent("ghost") {
            Err(WardenError::AgentNotFound { name, available }) => {
                assert_eq!(name, "ghost");
                assert_eq!(available, vec!["planner".to_string(), "coder".to_string()]);
            }
            Err(other) => panic!("expected AgentNotFound, got {:?}", other),
            Ok(_) => panic!("expected AgentNotFound"),
        }
    }
}

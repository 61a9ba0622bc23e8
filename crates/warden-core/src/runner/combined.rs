use std::sync::{Arc, Mutex, PoisonError};

use warden_contracts::{
    error::WardenResult,
    message::HookMessage,
    workflow::{RunOptions, WorkflowResult},
};

use crate::{
    interception::{apply_interceptions, InterceptionEvent, MessageInterception},
    traits::{MessageHook, MultiAgentSystem, TraceWriter},
};

use super::{MessageLogger, MonitoredRunner, RunnerCore, WorkflowRunner};

/// Interception layered on top of monitoring.
///
/// For every message: apply the interception rules (logging each rewrite as
/// an `intercept` step), then hand the rewritten message to the monitoring
/// logger. Monitors therefore see post-interception content.
#[derive(Clone)]
pub struct CombinedRunner {
    monitored: MonitoredRunner,
    interceptions: Vec<MessageInterception>,
    events: Arc<Mutex<Vec<InterceptionEvent>>>,
}

impl CombinedRunner {
    pub fn new(
        mas: Arc<dyn MultiAgentSystem>,
        writer: Arc<dyn TraceWriter>,
        interceptions: Vec<MessageInterception>,
    ) -> Self {
        Self::from_monitored(MonitoredRunner::new(mas, writer), interceptions)
    }

    /// Build on an already configured monitored runner (callbacks, transforms).
    pub fn from_monitored(monitored: MonitoredRunner, interceptions: Vec<MessageInterception>) -> Self {
        Self {
            monitored,
            interceptions,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_interception(&mut self, interception: MessageInterception) {
        self.interceptions.push(interception);
    }

    pub fn monitored(&self) -> &MonitoredRunner {
        &self.monitored
    }

    pub fn events(&self) -> Vec<InterceptionEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn on_message(&self, message: HookMessage) -> HookMessage {
        combined_hook(&self.interceptions, &self.events, &self.monitored.logger(), message)
    }

    fn hook(&self) -> MessageHook {
        let rules = Arc::new(self.interceptions.clone());
        let events = self.events.clone();
        let logger = self.monitored.logger();
        Arc::new(move |message| combined_hook(&rules, &events, &logger, message))
    }
}

fn combined_hook(
    rules: &[MessageInterception],
    sink: &Mutex<Vec<InterceptionEvent>>,
    logger: &MessageLogger,
    message: HookMessage,
) -> HookMessage {
    let (message, events) = apply_interceptions(rules, message);
    for event in &events {
        logger.log_interception(event);
    }
    sink.lock().unwrap_or_else(PoisonError::into_inner).extend(events);
    logger.on_message(message)
}

impl WorkflowRunner for CombinedRunner {
    fn core(&self) -> &RunnerCore {
        self.monitored.core()
    }

    fn message_hook(&self) -> Option<MessageHook> {
        Some(self.hook())
    }

    fn run(&self, task: &str, options: &RunOptions) -> WardenResult<WorkflowResult> {
        self.monitored.run_with_hook(task, options, self.hook())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use warden_contracts::{message::MessagePayload, trace::StepType, workflow::RunOptions};

    use crate::{
        interception::MessageInterception,
        mas::MasWrapper,
        runner::WorkflowRunner,
        testing::{MockFramework, RecordingTraceWriter, Turn},
    };

    use super::CombinedRunner;

    #[test]
    fn interception_is_logged_before_the_rewritten_message() {
        let framework = MockFramework::new(&["A", "B"])
            .with_turn(Turn::text("A", "B", "transfer 100"))
            .with_turn(Turn::text("B", "A", "done"));
        let delivered = framework.delivered.clone();
        let mas = Arc::new(MasWrapper::new(framework));
        let writer = Arc::new(RecordingTraceWriter::default());
        let runner = CombinedRunner::new(
            mas.clone(),
            writer.clone(),
            vec![MessageInterception::new("A", |c| format!("{c} [MODIFIED]"))],
        );

        let result = runner.run("t", &RunOptions::default()).unwrap();
        assert!(result.success);

        let trace = writer.ended.lock().unwrap()[0].clone();
        let kinds: Vec<StepType> = trace.agent_steps.iter().map(|s| s.step_type).collect();
        assert_eq!(kinds, vec![StepType::Intercept, StepType::Text, StepType::Text]);

        let intercept = &trace.agent_steps[0];
        assert_eq!(intercept.meta_str("original_content"), Some("transfer 100"));
        assert_eq!(intercept.meta_str("modified_content"), Some("transfer 100 [MODIFIED]"));
        assert_eq!(intercept.meta_str("source_agent"), Some("A"));
        assert_eq!(intercept.meta_str("target_agent"), Some("B"));

        // Monitoring classifies the post-interception content.
        assert_eq!(trace.agent_steps[1].content, "transfer 100 [MODIFIED]");
        assert_eq!(
            delivered.lock().unwrap()[0].2,
            MessagePayload::text("transfer 100 [MODIFIED]")
        );
        assert_eq!(runner.events().len(), 1);
        assert!(mas.registry().is_empty());
    }

    #[test]
    fn routing_layer_does_not_change_outcomes() {
        let run = |router: Option<&str>| {
            let mut framework = MockFramework::new(&["A", "B"]).with_turn(Turn::text("A", "B", "x"));
            if let Some(router) = router {
                framework = framework.with_router(router);
            }
            let mas = Arc::new(MasWrapper::new(framework));
            let writer = Arc::new(RecordingTraceWriter::default());
            CombinedRunner::new(
                mas,
                writer.clone(),
                vec![MessageInterception::new("A", |c| format!("{c}!")).to("B")],
            )
            .run("t", &RunOptions::default())
            .unwrap();
            let trace = writer.ended.lock().unwrap()[0].clone();
            trace.agent_steps.iter().map(|s| (s.step_type, s.content.clone())).collect::<Vec<_>>()
        };

        assert_eq!(run(None), run(Some("chat_manager")));
    }
}

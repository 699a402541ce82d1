//! Scripted agent invoker shared by unit tests

use crate::dispatcher::{AgentCall, AgentError, AgentInvoker, AgentOutput};
use async_trait::async_trait;
use conclave_replay::Decision;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

enum Script {
    Answer(AgentOutput, Duration),
    Fail(AgentError),
    Hang,
}

/// Answers each role from a script
#[derive(Default)]
pub(crate) struct ScriptedInvoker {
    scripts: HashMap<String, Script>,
    calls: AtomicUsize,
}

impl ScriptedInvoker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn answer(self, role: &str, decision: Decision, confidence: f64) -> Self {
        self.answer_after(role, decision, confidence, Duration::ZERO)
    }

    pub(crate) fn answer_after(
        self,
        role: &str,
        decision: Decision,
        confidence: f64,
        delay: Duration,
    ) -> Self {
        let output = AgentOutput::new(decision, format!("{role} says {decision}"), confidence);
        self.output_after(role, output, delay)
    }

    pub(crate) fn output_after(mut self, role: &str, output: AgentOutput, delay: Duration) -> Self {
        self.scripts
            .insert(role.to_string(), Script::Answer(output, delay));
        self
    }

    pub(crate) fn fail(mut self, role: &str, error: AgentError) -> Self {
        self.scripts.insert(role.to_string(), Script::Fail(error));
        self
    }

    pub(crate) fn hang(mut self, role: &str) -> Self {
        self.scripts.insert(role.to_string(), Script::Hang);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentInvoker for ScriptedInvoker {
    async fn invoke(&self, role: &str, _call: &AgentCall) -> Result<AgentOutput, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.scripts.get(role) {
            Some(Script::Answer(output, delay)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Ok(output.clone())
            }
            Some(Script::Fail(error)) => Err(error.clone()),
            Some(Script::Hang) => {
                std::future::pending::<()>().await;
                Err(AgentError::Timeout)
            }
            None => Err(AgentError::NotConfigured(role.to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

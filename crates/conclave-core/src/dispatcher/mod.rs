//! Agent Dispatcher
//!
//! Fans a request out to one or more agent roles. Each invocation is bounded
//! by the configured timeout and isolated from the others: errors and
//! timeouts become synthetic responses instead of failing the dispatch.
//! Responses are appended to the registry in completion order.

mod http;
mod invoker;


pub use http::{AgentEndpointConfig, HttpAgentInvoker};
pub use invoker::{AgentCall, AgentError, AgentInvoker, AgentOutput, AgentUsage};

use crate::budget::{CostGuard, CostRecord};
use crate::config::DispatchConfig;
use crate::registry::ConversationRegistry;
use conclave_replay::{AgentResponse, DecisionRequest};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Concurrent, failure-isolated agent fan-out
pub struct Dispatcher {
    invoker: Arc<dyn AgentInvoker>,
    registry: Arc<ConversationRegistry>,
    costs: Arc<CostGuard>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Create a dispatcher
    #[must_use]
    pub fn new(
        invoker: Arc<dyn AgentInvoker>,
        registry: Arc<ConversationRegistry>,
        costs: Arc<CostGuard>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            invoker,
            registry,
            costs,
            config,
        }
    }

    /// Invoke a single agent and append its response
    #[instrument(skip(self, request))]
    pub async fn dispatch_single(
        &self,
        conversation_id: &str,
        role: &str,
        request: &DecisionRequest,
    ) -> Vec<AgentResponse> {
        let call = Arc::new(AgentCall::new(conversation_id, request));
        let response = self.invocation().run(role.to_string(), call).await;
        self.append(conversation_id, &response).await;
        vec![response]
    }

    /// Invoke every role concurrently.
    ///
    /// Returns the responses in completion order once every invocation has
    /// answered, failed or timed out. Duplicate roles are invoked once.
    #[instrument(skip(self, request), fields(agents = roles.len()))]
    pub async fn dispatch_multi(
        &self,
        conversation_id: &str,
        roles: &[String],
        request: &DecisionRequest,
    ) -> Vec<AgentResponse> {
        let mut seen = HashSet::new();
        let roles: Vec<String> = roles
            .iter()
            .filter(|role| seen.insert(role.as_str()))
            .cloned()
            .collect();

        let call = Arc::new(AgentCall::new(conversation_id, request));
        let started = Instant::now();
        info!(
            conversation_id = %conversation_id,
            agents = ?roles,
            max_parallel = self.config.max_parallel,
            "Dispatching to agents"
        );

        // Each invocation owns its inputs so the fan-out future stays Send
        let invocation = self.invocation();
        let mut pending = stream::iter(roles)
            .map(move |role| invocation.clone().run(role, call.clone()))
            .buffer_unordered(self.config.max_parallel.max(1));

        let mut responses = Vec::new();
        while let Some(response) = pending.next().await {
            self.append(conversation_id, &response).await;
            responses.push(response);
        }

        let failed = responses.iter().filter(|r| r.is_error()).count();
        info!(
            conversation_id = %conversation_id,
            responses = responses.len(),
            failed,
            duration_ms = started.elapsed().as_millis() as u64,
            "Dispatch complete"
        );
        responses
    }

    fn invocation(&self) -> Invocation {
        Invocation {
            invoker: self.invoker.clone(),
            costs: self.costs.clone(),
            timeout: self.config.agent_timeout(),
        }
    }

    async fn append(&self, conversation_id: &str, response: &AgentResponse) {
        if let Err(e) = self
            .registry
            .append_response(conversation_id, response.clone())
            .await
        {
            warn!(
                conversation_id = %conversation_id,
                agent = %response.agent,
                error = %e,
                "Could not append agent response"
            );
        }
    }
}

/// One bounded agent call with cost accounting
#[derive(Clone)]
struct Invocation {
    invoker: Arc<dyn AgentInvoker>,
    costs: Arc<CostGuard>,
    timeout: Duration,
}

impl Invocation {
    async fn run(self, role: String, call: Arc<AgentCall>) -> AgentResponse {
        let conversation_id = call.conversation_id.as_str();
        let started = Instant::now();

        let result = tokio::time::timeout(self.timeout, self.invoker.invoke(&role, &call)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(output)) => {
                debug!(
                    conversation_id = %conversation_id,
                    agent = %role,
                    decision = %output.decision,
                    duration_ms = elapsed_ms,
                    "Agent answered"
                );
                if let Some(usage) = &output.usage {
                    let cost = usage
                        .cost_usd
                        .unwrap_or_else(|| self.costs.estimate_cost(&usage.model, usage.tokens));
                    let record = CostRecord::new(&role, usage.model.clone(), usage.tokens, cost)
                        .with_conversation(conversation_id);
                    if let Err(e) = self.costs.record_entry(record).await {
                        warn!(
                            conversation_id = %conversation_id,
                            agent = %role,
                            error = %e,
                            "Failed to record agent cost, continuing"
                        );
                    }
                }

                let response =
                    AgentResponse::new(role, output.decision, output.reasoning, output.confidence);
                match output.data {
                    Some(data) => response.with_data(data),
                    None => response,
                }
            }
            Ok(Err(AgentError::Timeout)) | Err(_) => {
                warn!(
                    conversation_id = %conversation_id,
                    agent = %role,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Agent did not respond in time"
                );
                AgentResponse::timed_out(role, self.timeout)
            }
            Ok(Err(e)) => {
                warn!(
                    conversation_id = %conversation_id,
                    agent = %role,
                    error = %e,
                    duration_ms = elapsed_ms,
                    "Agent invocation failed"
                );
                AgentResponse::invocation_failed(role, e.to_string())
            }
        }
    }
}

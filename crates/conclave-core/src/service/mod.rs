//! Decision Service - The engine's outward contract
//!
//! Explicitly constructed with `init` and torn down with `shutdown`; callers
//! hold it by reference (or `Arc`) rather than through ambient global state.
//!
//! A conversation runs: create → dispatch → evaluate → escalate (by policy)
//! → finalize. A manual stop may land at any point; whatever finalizes first
//! wins and the other path becomes a no-op.

#[cfg(test)]
mod tests;

use crate::approval::{
    ApprovalGate, ApprovalRequest, ApprovalStore, MemoryApprovalStore, SqliteApprovalStore,
};
use crate::budget::{CostGuard, CostStore, MemoryCostStore, SqliteCostStore};
use crate::config::CoreConfig;
use crate::consensus::ConsensusEvaluator;
use crate::dispatcher::{AgentInvoker, Dispatcher};
use crate::error::{Error, Result};
use crate::registry::ConversationRegistry;
use conclave_replay::{
    AgentResponse, Conversation, DecisionRequest, Escalation, EventStore, EventStoreTrait,
    FinalDecision, MemoryEventStore, ProtocolResult,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Agent name on approval requests opened by escalation
pub const ESCALATION_AGENT: &str = "consensus";

/// Durable collaborators the service runs on
#[derive(Clone)]
pub struct ServiceStores {
    /// Decision log
    pub events: Arc<dyn EventStoreTrait>,
    /// Approval requests
    pub approvals: Arc<dyn ApprovalStore>,
    /// Cost records
    pub costs: Arc<dyn CostStore>,
}

impl ServiceStores {
    /// Volatile stores (for testing and dry runs)
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            events: Arc::new(MemoryEventStore::new()),
            approvals: Arc::new(MemoryApprovalStore::new()),
            costs: Arc::new(MemoryCostStore::new()),
        }
    }

    /// SQLite stores sharing the event store's database
    pub async fn sqlite(events: EventStore) -> Result<Self> {
        let approvals = SqliteApprovalStore::new(events.pool().clone());
        approvals.migrate().await?;
        let costs = SqliteCostStore::new(events.pool().clone());
        costs.migrate().await?;

        Ok(Self {
            events: Arc::new(events),
            approvals: Arc::new(approvals),
            costs: Arc::new(costs),
        })
    }
}

/// What a caller gets back from a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationOutcome {
    /// The finalized conversation
    pub conversation: Conversation,
    /// Outcome it was finalized with
    pub final_decision: FinalDecision,
    /// Consensus detail, absent for failed or stopped conversations
    pub protocol_result: Option<ProtocolResult>,
}

impl ConversationOutcome {
    fn from_conversation(conversation: Conversation) -> Self {
        Self {
            final_decision: conversation
                .final_decision
                .unwrap_or(FinalDecision::Failed),
            protocol_result: conversation.protocol_result.clone(),
            conversation,
        }
    }

    /// Whether the caller must not proceed
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.protocol_result
            .as_ref()
            .is_some_and(ProtocolResult::is_blocking)
    }
}

/// Multi-agent decision service
pub struct DecisionService {
    config: CoreConfig,
    registry: Arc<ConversationRegistry>,
    dispatcher: Dispatcher,
    evaluator: ConsensusEvaluator,
    approvals: Arc<ApprovalGate>,
    costs: Arc<CostGuard>,
    accepting: AtomicBool,
}

impl DecisionService {
    /// Validate the configuration and wire the components
    pub fn init(
        config: CoreConfig,
        stores: ServiceStores,
        invoker: Arc<dyn AgentInvoker>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(ConversationRegistry::new(stores.events.clone()));
        let costs = Arc::new(CostGuard::new(stores.costs, config.budget.clone()));
        let approvals = Arc::new(ApprovalGate::new(stores.approvals, &config.approval));
        let dispatcher = Dispatcher::new(
            invoker.clone(),
            registry.clone(),
            costs.clone(),
            config.dispatch.clone(),
        );
        let evaluator = ConsensusEvaluator::new(config.consensus.clone());

        info!(
            invoker = invoker.name(),
            event_store = stores.events.name(),
            veto_threshold = config.consensus.veto_threshold,
            agent_timeout_secs = config.dispatch.agent_timeout_secs,
            "Decision service initialized"
        );

        Ok(Self {
            config,
            registry,
            dispatcher,
            evaluator,
            approvals,
            costs,
            accepting: AtomicBool::new(true),
        })
    }

    /// Ask one agent
    #[instrument(skip(self, request))]
    pub async fn start_conversation(
        &self,
        role: &str,
        request: &DecisionRequest,
        id: Option<String>,
    ) -> Result<ConversationOutcome> {
        self.run(id, &[role.to_string()], request, false).await
    }

    /// Ask several agents concurrently and reduce their answers
    #[instrument(skip(self, request))]
    pub async fn start_multi_agent_conversation(
        &self,
        roles: &[String],
        request: &DecisionRequest,
        id: Option<String>,
    ) -> Result<ConversationOutcome> {
        self.run(id, roles, request, true).await
    }

    /// A conversation from the cache, or rebuilt from the log
    pub async fn get_conversation_history(&self, id: &str) -> Result<Conversation> {
        self.registry
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Conversations currently cached
    pub async fn get_all_conversations(&self) -> Vec<Conversation> {
        self.registry.list_all().await
    }

    /// Stop a conversation; a no-op if it is already terminal
    pub async fn manually_stop(&self, id: &str, reason: &str) -> Result<Conversation> {
        self.registry.manually_stop(id, reason).await
    }

    /// The human approval gate
    #[must_use]
    pub fn approvals(&self) -> &ApprovalGate {
        &self.approvals
    }

    /// The cost guard
    #[must_use]
    pub fn costs(&self) -> &CostGuard {
        &self.costs
    }

    /// The conversation registry
    #[must_use]
    pub fn registry(&self) -> &ConversationRegistry {
        &self.registry
    }

    /// Configuration in effect
    #[must_use]
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Whether new conversations are accepted
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Stop accepting conversations and drop the cache.
    ///
    /// Returns how many cached conversations were still in progress; their
    /// history remains in the log.
    pub async fn shutdown(&self) -> usize {
        self.accepting.store(false, Ordering::SeqCst);

        let in_progress = self.registry.in_progress_count().await;
        if in_progress > 0 {
            warn!(in_progress, "Shutting down with conversations in progress");
        }
        let cleared = self.registry.clear().await;
        info!(cleared, "Decision service shut down");
        in_progress
    }

    async fn run(
        &self,
        id: Option<String>,
        roles: &[String],
        request: &DecisionRequest,
        multi_agent: bool,
    ) -> Result<ConversationOutcome> {
        if !self.is_accepting() {
            return Err(Error::ShuttingDown);
        }
        if roles.is_empty() || roles.iter().any(|r| r.trim().is_empty()) {
            return Err(Error::InvalidRequest(
                "at least one non-empty agent role is required".to_string(),
            ));
        }

        let conversation = self.registry.create(id, request).await?;
        let id = conversation.id;

        let responses = if multi_agent {
            self.dispatcher.dispatch_multi(&id, roles, request).await
        } else {
            self.dispatcher
                .dispatch_single(&id, &roles[0], request)
                .await
        };

        let Some(mut result) = self.evaluator.evaluate(&responses, multi_agent) else {
            let conversation = self
                .registry
                .finalize(&id, FinalDecision::Failed, None)
                .await?;
            if conversation.final_decision != Some(FinalDecision::Failed) {
                return Ok(ConversationOutcome::from_conversation(conversation));
            }
            let reason = failure_summary(&responses);
            error!(conversation_id = %id, reason = %reason, "No agent produced a usable response");
            return Err(Error::TotalDispatchFailure {
                conversation_id: id,
                reason,
            });
        };

        if let Some(reason) = self.evaluator.escalation_reason(request, &result) {
            if let Some(current) = self.registry.get(&id).await? {
                if current.is_terminal() {
                    return Ok(ConversationOutcome::from_conversation(current));
                }
            }
            match self.escalate(&id, request, &result, &reason).await {
                Ok(escalation) => {
                    self.registry.note_escalation(&id, &escalation).await;
                    result.final_decision = FinalDecision::Escalated;
                    result.escalation = Some(escalation);
                }
                Err(e) => {
                    error!(conversation_id = %id, error = %e, "Escalation failed");
                    self.registry
                        .finalize(&id, FinalDecision::Failed, None)
                        .await?;
                    return Err(e);
                }
            }
        }

        let conversation = self
            .registry
            .finalize(&id, result.final_decision, Some(result.clone()))
            .await?;

        if conversation.final_decision == Some(FinalDecision::Rejected) {
            if result.is_blocking() {
                warn!(conversation_id = %id, rule = ?result.rule, "Decision rejected");
            } else {
                warn!(
                    conversation_id = %id,
                    rule = ?result.rule,
                    "Decision rejected (advisory only, caller may proceed)"
                );
            }
        }

        Ok(ConversationOutcome::from_conversation(conversation))
    }

    async fn escalate(
        &self,
        conversation_id: &str,
        request: &DecisionRequest,
        result: &ProtocolResult,
        reason: &str,
    ) -> Result<Escalation> {
        let votes: Vec<_> = result
            .responses
            .iter()
            .map(|r| {
                json!({
                    "agent": r.agent,
                    "decision": r.decision,
                    "confidence": r.confidence,
                    "error": r.error,
                })
            })
            .collect();
        let data = json!({
            "prompt": request.prompt,
            "severity": request.severity,
            "urgency": request.urgency,
            "proposed_decision": result.proposed_decision,
            "consensus": result.consensus,
            "rule": result.rule,
            "responses": votes,
        });

        let approval = ApprovalRequest::new(
            ESCALATION_AGENT,
            format!("escalate:{conversation_id}"),
            reason,
            data,
            self.approvals.default_ttl(),
        )
        .with_conversation(conversation_id);
        let approval = self.approvals.submit(approval).await?;

        Ok(Escalation {
            approval_id: approval.id,
            reason: reason.to_string(),
        })
    }
}

fn failure_summary(responses: &[AgentResponse]) -> String {
    if responses.is_empty() {
        return "no agent was invoked".to_string();
    }
    responses
        .iter()
        .map(|r| format!("{}: {}", r.agent, r.error.as_deref().unwrap_or("unknown")))
        .collect::<Vec<_>>()
        .join("; ")
}

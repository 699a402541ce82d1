//! Consensus Evaluator
//!
//! Reduces collected agent responses to one `ProtocolResult`. Error
//! responses (failed or timed-out invocations) are kept in the result for
//! audit but never vote.
//!
//! Multi-agent reduction, in priority order:
//! 1. unanimous agreement wins outright
//! 2. a rejection at or above the veto threshold forces `rejected`
//! 3. the most frequent decision wins
//! 4. tied decisions go to the single most confident response, and on an
//!    exact confidence tie to the more cautious decision

use crate::config::ConsensusConfig;
use conclave_replay::{
    AgentResponse, ConsensusRule, Decision, DecisionRequest, FinalDecision, ProtocolResult,
};
use std::cmp::Ordering;

/// Reduces responses to a protocol result
#[derive(Debug, Clone)]
pub struct ConsensusEvaluator {
    config: ConsensusConfig,
}

impl ConsensusEvaluator {
    /// Create an evaluator
    #[must_use]
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }

    /// Configuration in effect
    #[must_use]
    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Reduce responses to a result.
    ///
    /// Returns `None` when no non-error response exists, i.e. the dispatch
    /// failed entirely.
    #[must_use]
    pub fn evaluate(&self, responses: &[AgentResponse], multi_agent: bool) -> Option<ProtocolResult> {
        let votes: Vec<&AgentResponse> = responses.iter().filter(|r| !r.is_error()).collect();
        let first = votes.first()?;

        let consensus = votes.iter().all(|r| r.decision == first.decision);
        let (proposed_decision, rule) = if !multi_agent {
            (first.decision, ConsensusRule::SingleAgent)
        } else if consensus {
            (first.decision, ConsensusRule::Unanimous)
        } else if self.vetoed(&votes) {
            (Decision::Rejected, ConsensusRule::Veto)
        } else {
            majority_or_tiebreak(&votes)
        };

        Some(ProtocolResult {
            final_decision: FinalDecision::from(proposed_decision),
            proposed_decision,
            consensus,
            rule,
            enforcement: self.config.enforcement,
            escalation: None,
            responses: responses.to_vec(),
        })
    }

    /// Why the outcome must go to a human, if the policy says so
    #[must_use]
    pub fn escalation_reason(
        &self,
        request: &DecisionRequest,
        result: &ProtocolResult,
    ) -> Option<String> {
        let policy = &self.config.escalation;
        let severity = request.severity;

        if policy.always_severities.contains(&severity) {
            return Some(format!(
                "severity {} always requires human approval",
                severity.as_str()
            ));
        }
        if !result.consensus && policy.non_unanimous_severities.contains(&severity) {
            return Some(format!(
                "non-unanimous vote ({:?}) at severity {}",
                result.rule,
                severity.as_str()
            ));
        }
        None
    }

    fn vetoed(&self, votes: &[&AgentResponse]) -> bool {
        votes
            .iter()
            .any(|r| r.decision == Decision::Rejected && r.confidence >= self.config.veto_threshold)
    }
}

fn majority_or_tiebreak(votes: &[&AgentResponse]) -> (Decision, ConsensusRule) {
    // (decision, votes, highest confidence) in first-seen order
    let mut tally: Vec<(Decision, usize, f64)> = Vec::new();
    for vote in votes {
        match tally.iter_mut().find(|(d, _, _)| *d == vote.decision) {
            Some(entry) => {
                entry.1 += 1;
                entry.2 = entry.2.max(vote.confidence);
            }
            None => tally.push((vote.decision, 1, vote.confidence)),
        }
    }

    let top = tally.iter().map(|(_, count, _)| *count).max().unwrap_or(0);
    let tied: Vec<_> = tally.iter().filter(|(_, count, _)| *count == top).collect();

    if let [(decision, _, _)] = tied.as_slice() {
        return (*decision, ConsensusRule::Majority);
    }

    let winner = tied
        .iter()
        .max_by(|a, b| {
            a.2.partial_cmp(&b.2)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.caution_rank().cmp(&b.0.caution_rank()))
        })
        .map(|(decision, _, _)| *decision)
        .unwrap_or(Decision::NoResponse);
    (winner, ConsensusRule::ConfidenceTiebreak)
}

//! Approval Gate - Request, decide, cancel and list

use super::request::{max_ttl, ApprovalCounts, ApprovalFilter, ApprovalRequest, ApprovalStatus, Verdict};
use super::store::ApprovalStore;
use crate::config::{ApprovalConfig, MAX_APPROVAL_TTL_SECS};
use crate::error::{Error, Result};
use chrono::{Duration, Utc};
use conclave_replay::timestamp_now;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Human approval gate over an approval store
pub struct ApprovalGate {
    store: Arc<dyn ApprovalStore>,
    default_ttl: Duration,
}

impl ApprovalGate {
    /// Create a gate
    #[must_use]
    pub fn new(store: Arc<dyn ApprovalStore>, config: &ApprovalConfig) -> Self {
        Self {
            store,
            default_ttl: Duration::seconds(
                config.default_ttl_secs.clamp(1, MAX_APPROVAL_TTL_SECS),
            ),
        }
    }

    /// Lifetime used when a request gives none
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Open a pending request expiring after `ttl` (or the default).
    ///
    /// Fails with `InvalidRequest` when `ttl` exceeds the maximum lifetime.
    pub async fn request(
        &self,
        agent: &str,
        action: &str,
        reasoning: &str,
        data: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<ApprovalRequest> {
        if let Some(ttl) = ttl.filter(|ttl| *ttl > max_ttl()) {
            return Err(Error::InvalidRequest(format!(
                "approval lifetime of {}s exceeds the maximum of {MAX_APPROVAL_TTL_SECS}s",
                ttl.num_seconds()
            )));
        }
        let request = ApprovalRequest::new(
            agent,
            action,
            reasoning,
            data,
            ttl.unwrap_or(self.default_ttl),
        );
        self.submit(request).await
    }

    /// Store a prepared request
    #[instrument(skip(self, request), fields(approval_id = %request.id, agent = %request.agent))]
    pub async fn submit(&self, request: ApprovalRequest) -> Result<ApprovalRequest> {
        self.store.insert(&request).await?;
        info!(
            action = %request.action,
            expiry_at = %request.expiry_at,
            "Approval requested"
        );
        Ok(request)
    }

    /// Answer a pending request.
    ///
    /// Fails with `AlreadyDecided` if the request is no longer pending,
    /// including when it expired unanswered.
    #[instrument(skip(self))]
    pub async fn decide(&self, id: Uuid, verdict: Verdict) -> Result<ApprovalRequest> {
        self.leave_pending(id, verdict.into()).await
    }

    /// Withdraw a pending request
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid) -> Result<ApprovalRequest> {
        self.leave_pending(id, ApprovalStatus::Cancelled).await
    }

    /// Fetch a request with its effective status
    pub async fn get(&self, id: Uuid) -> Result<Option<ApprovalRequest>> {
        let now = Utc::now();
        Ok(self.store.get(id).await?.map(|r| r.seen_at(now)))
    }

    /// Requests matching the filter, with effective statuses, oldest first
    pub async fn list(&self, filter: &ApprovalFilter) -> Result<Vec<ApprovalRequest>> {
        let now = Utc::now();
        Ok(self
            .store
            .list(filter)
            .await?
            .into_iter()
            .map(|r| r.seen_at(now))
            .filter(|r| filter.accepts_status(r.status))
            .collect())
    }

    /// Count requests per effective status
    pub async fn counts(&self, filter: &ApprovalFilter) -> Result<ApprovalCounts> {
        let mut counts = ApprovalCounts::default();
        for request in self.list(filter).await? {
            counts.add(request.status);
        }
        Ok(counts)
    }

    async fn leave_pending(&self, id: Uuid, to: ApprovalStatus) -> Result<ApprovalRequest> {
        let at = timestamp_now();

        if self.store.transition(id, to, at).await? {
            let request = self
                .store
                .get(id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("approval request {id}")))?;
            info!(approval_id = %id, status = %to, "Approval request closed");
            return Ok(request);
        }

        match self.store.get(id).await? {
            None => Err(Error::NotFound(format!("approval request {id}"))),
            Some(current) => {
                let status = current.effective_status_at(at);
                warn!(
                    approval_id = %id,
                    requested = %to,
                    current = %status,
                    "Approval request already decided"
                );
                Err(Error::AlreadyDecided { id, status })
            }
        }
    }
}

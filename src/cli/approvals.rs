//! `conclave approvals`

use super::{parse_json, print_json};
use anyhow::{bail, Result};
use clap::Subcommand;
use conclave_core::{
    ApprovalFilter, ApprovalRequest, ApprovalStatus, DecisionService, Verdict,
    MAX_APPROVAL_TTL_SECS,
};
use serde_json::json;
use uuid::Uuid;

#[derive(Subcommand, Debug)]
pub enum ApprovalCommands {
    /// List requests with their effective status
    List {
        /// Effective status to include (repeatable; default pending and expired)
        #[arg(long = "status")]
        statuses: Vec<ApprovalStatus>,
        /// Requesting agent
        #[arg(long)]
        agent: Option<String>,
        /// Linked conversation
        #[arg(long)]
        conversation: Option<String>,
        /// Include every status
        #[arg(long, conflicts_with = "statuses")]
        all: bool,
    },
    /// Open a request for human review
    Request {
        /// Requesting agent
        #[arg(long)]
        agent: String,
        /// Action awaiting approval
        #[arg(long)]
        action: String,
        /// Why the agent wants it
        #[arg(long)]
        reasoning: String,
        /// Supporting payload as JSON
        #[arg(long, value_parser = parse_json)]
        data: Option<serde_json::Value>,
        /// Seconds until the request lapses
        #[arg(long)]
        ttl_secs: Option<i64>,
        /// Linked conversation
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Approve or reject a pending request
    Decide {
        /// Request ID
        id: Uuid,
        /// approved | rejected
        verdict: Verdict,
    },
    /// Withdraw a pending request
    Cancel {
        /// Request ID
        id: Uuid,
    },
    /// Count requests per effective status
    Counts,
}

pub async fn run(service: &DecisionService, command: ApprovalCommands) -> Result<()> {
    let gate = service.approvals();
    match command {
        ApprovalCommands::List {
            statuses,
            agent,
            conversation,
            all,
        } => {
            let mut filter = if all || !statuses.is_empty() {
                ApprovalFilter::new()
            } else {
                ApprovalFilter::pending_or_expired()
            };
            for status in statuses {
                filter = filter.with_status(status);
            }
            if let Some(agent) = agent {
                filter = filter.with_agent(agent);
            }
            if let Some(conversation) = conversation {
                filter = filter.with_conversation(conversation);
            }
            print_json(&gate.list(&filter).await?)
        }
        ApprovalCommands::Request {
            agent,
            action,
            reasoning,
            data,
            ttl_secs,
            conversation,
        } => {
            let ttl = request_ttl(ttl_secs, gate.default_ttl())?;
            let mut request = ApprovalRequest::new(
                &agent,
                &action,
                &reasoning,
                data.unwrap_or_else(|| json!({})),
                ttl,
            );
            if let Some(conversation) = conversation {
                request = request.with_conversation(conversation);
            }
            print_json(&gate.submit(request).await?)
        }
        ApprovalCommands::Decide { id, verdict } => print_json(&gate.decide(id, verdict).await?),
        ApprovalCommands::Cancel { id } => print_json(&gate.cancel(id).await?),
        ApprovalCommands::Counts => print_json(&gate.counts(&ApprovalFilter::new()).await?),
    }
}

fn request_ttl(ttl_secs: Option<i64>, default: chrono::Duration) -> Result<chrono::Duration> {
    match ttl_secs {
        Some(secs) if !(1..=MAX_APPROVAL_TTL_SECS).contains(&secs) => {
            bail!("--ttl-secs must be within 1..={MAX_APPROVAL_TTL_SECS}")
        }
        Some(secs) => Ok(chrono::Duration::seconds(secs)),
        None => Ok(default),
    }
}

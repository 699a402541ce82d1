//! `conclave history` and `conclave stop`

use super::print_json;
use anyhow::{bail, Result};
use clap::Args;
use conclave_core::DecisionService;
use serde_json::json;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Conversation ID
    pub id: String,

    /// Rebuild from the decision log and report inferred gaps
    #[arg(long)]
    pub replay: bool,
}

#[derive(Args, Debug)]
pub struct StopArgs {
    /// Conversation ID
    pub id: String,

    /// Recorded with the stop marker
    #[arg(long, default_value = "stopped by operator")]
    pub reason: String,
}

pub async fn run(service: &DecisionService, args: HistoryArgs) -> Result<()> {
    if !args.replay {
        let conversation = service.get_conversation_history(&args.id).await?;
        return print_json(&conversation);
    }

    let Some(reconstruction) = service.registry().reconstruct(&args.id).await? else {
        bail!("conversation {} not found in the decision log", args.id);
    };
    print_json(&json!({
        "conversation": reconstruction.conversation,
        "events": reconstruction.event_count,
        "gaps": reconstruction.gaps,
    }))
}

pub async fn stop(service: &DecisionService, args: StopArgs) -> Result<()> {
    let conversation = service.manually_stop(&args.id, &args.reason).await?;
    print_json(&conversation)
}

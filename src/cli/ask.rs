//! `conclave ask`

use super::{parse_json, print_json};
use anyhow::Result;
use clap::Args;
use conclave_core::{ConversationType, DecisionRequest, DecisionService, Severity, Urgency};

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Agent role to consult (repeat for a multi-agent vote)
    #[arg(long = "role", required = true)]
    pub roles: Vec<String>,

    /// Question or proposed action
    #[arg(long)]
    pub prompt: String,

    /// Conversation ID (generated when omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// request | query | analysis | validation
    #[arg(long = "type", default_value = "request")]
    pub kind: ConversationType,

    /// low | normal | high | critical
    #[arg(long, default_value = "normal")]
    pub urgency: Urgency,

    /// low | medium | high | critical
    #[arg(long, default_value = "medium")]
    pub severity: Severity,

    /// Structured context as JSON
    #[arg(long, value_parser = parse_json)]
    pub context: Option<serde_json::Value>,

    /// External correlation ID (repeatable)
    #[arg(long = "workflow-id")]
    pub workflow_ids: Vec<String>,
}

impl AskArgs {
    fn request(&self) -> DecisionRequest {
        let mut request = DecisionRequest::new(&self.prompt)
            .with_kind(self.kind)
            .with_urgency(self.urgency)
            .with_severity(self.severity);
        if let Some(context) = &self.context {
            request = request.with_context(context.clone());
        }
        for id in &self.workflow_ids {
            request = request.with_workflow_id(id);
        }
        request
    }
}

pub async fn run(service: &DecisionService, args: AskArgs) -> Result<()> {
    let request = args.request();
    let outcome = match args.roles.as_slice() {
        [role] => {
            service
                .start_conversation(role, &request, args.id.clone())
                .await?
        }
        roles => {
            service
                .start_multi_agent_conversation(roles, &request, args.id.clone())
                .await?
        }
    };
    print_json(&outcome)
}

//! `conclave cost`

use super::print_json;
use anyhow::Result;
use clap::Subcommand;
use conclave_core::DecisionService;

#[derive(Subcommand, Debug)]
pub enum CostCommands {
    /// Rolling daily and weekly spend against the caps
    Stats,
    /// Record spend made outside a dispatch
    Record {
        /// Agent role
        #[arg(long)]
        agent: String,
        /// Model identifier
        #[arg(long)]
        model: String,
        /// Tokens consumed
        #[arg(long)]
        tokens: u64,
        /// Cost in USD (estimated from the pricing table when omitted)
        #[arg(long)]
        cost: Option<f64>,
    },
}

pub async fn run(service: &DecisionService, command: CostCommands) -> Result<()> {
    let guard = service.costs();
    match command {
        CostCommands::Stats => print_json(&guard.get_stats().await?),
        CostCommands::Record {
            agent,
            model,
            tokens,
            cost,
        } => {
            let cost = cost.unwrap_or_else(|| guard.estimate_cost(&model, tokens));
            print_json(&guard.record(&agent, &model, tokens, cost).await?)
        }
    }
}

//! Cost Guard - Rolling spend totals over a cost store

use super::record::{CostRecord, CostStats};
use super::store::CostStore;
use crate::config::BudgetConfig;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Advisory budget guard
pub struct CostGuard {
    store: Arc<dyn CostStore>,
    config: BudgetConfig,
}

impl CostGuard {
    /// Create a guard over a store
    #[must_use]
    pub fn new(store: Arc<dyn CostStore>, config: BudgetConfig) -> Self {
        Self { store, config }
    }

    /// Budget configuration in effect
    #[must_use]
    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Estimate the cost of a call from configured pricing.
    ///
    /// Unknown models are priced at zero.
    #[must_use]
    pub fn estimate_cost(&self, model: &str, tokens: u64) -> f64 {
        self.config
            .pricing
            .get(model)
            .map(|per_1k| tokens as f64 / 1000.0 * per_1k)
            .unwrap_or(0.0)
    }

    /// Record one agent call
    pub async fn record(
        &self,
        agent: &str,
        model: &str,
        tokens: u64,
        cost_usd: f64,
    ) -> Result<CostRecord> {
        self.record_entry(CostRecord::new(agent, model, tokens, cost_usd))
            .await
    }

    /// Append a prepared record.
    ///
    /// Crossing a cap is reported at `warn` level and never fails the call.
    #[instrument(skip(self, record), fields(agent = %record.agent, model = %record.model))]
    pub async fn record_entry(&self, record: CostRecord) -> Result<CostRecord> {
        self.store.append(&record).await?;
        debug!(
            tokens = record.tokens_used,
            cost_usd = record.cost_usd,
            "Recorded agent cost"
        );

        if let Err(e) = self.check_caps(Utc::now()).await {
            debug!(error = %e, "Skipped budget check");
        }

        Ok(record)
    }

    /// Warn when rolling spend is past either cap. Uses the store's
    /// aggregate so no records are loaded.
    pub(super) async fn check_caps(&self, now: DateTime<Utc>) -> Result<bool> {
        let daily_total = self.store.spend_since(now - Duration::hours(24)).await?;
        let weekly_total = self.store.spend_since(now - Duration::days(7)).await?;
        let over = daily_total > self.config.daily_cap_usd
            || weekly_total > self.config.weekly_cap_usd;
        if over {
            warn!(
                daily_total,
                daily_cap = self.config.daily_cap_usd,
                weekly_total,
                weekly_cap = self.config.weekly_cap_usd,
                "Agent spend is over budget"
            );
        }
        Ok(over)
    }

    /// Rolling daily and weekly totals
    pub async fn get_stats(&self) -> Result<CostStats> {
        self.stats_at(Utc::now()).await
    }

    /// Rolling totals as seen at `now`
    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<CostStats> {
        let day_start = now - Duration::hours(24);
        let week_start = now - Duration::days(7);
        let records = self.store.records_since(week_start).await?;

        let mut stats = CostStats {
            daily_cap: self.config.daily_cap_usd,
            weekly_cap: self.config.weekly_cap_usd,
            ..Default::default()
        };

        for record in records.iter().filter(|r| r.created_at <= now) {
            stats.weekly_total += record.cost_usd;
            stats.weekly_requests += 1;
            if record.created_at >= day_start {
                stats.daily_total += record.cost_usd;
                stats.daily_requests += 1;
            }

            let agent = stats.by_agent.entry(record.agent.clone()).or_default();
            agent.requests += 1;
            agent.tokens = agent.tokens.saturating_add(record.tokens_used);
            agent.cost_usd += record.cost_usd;
        }

        stats.daily_exceeded = stats.daily_total > stats.daily_cap;
        stats.weekly_exceeded = stats.weekly_total > stats.weekly_cap;
        Ok(stats)
    }

    /// Store name (for logging)
    #[must_use]
    pub fn store_name(&self) -> &str {
        self.store.name()
    }
}

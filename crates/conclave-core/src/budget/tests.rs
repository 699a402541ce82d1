use super::*;
use crate::config::BudgetConfig;
use chrono::{Duration, Utc};
use conclave_replay::EventStore;
use std::sync::Arc;

fn config() -> BudgetConfig {
    let mut config = BudgetConfig {
        daily_cap_usd: 1.0,
        weekly_cap_usd: 5.0,
        ..Default::default()
    };
    config.pricing.insert("gpt-4o-mini".to_string(), 0.002);
    config
}

#[test]
fn test_estimate_cost() {
    let guard = CostGuard::new(Arc::new(MemoryCostStore::new()), config());
    assert!((guard.estimate_cost("gpt-4o-mini", 5_000) - 0.01).abs() < 1e-12);
    assert_eq!(guard.estimate_cost("unknown-model", 5_000), 0.0);
}

#[test]
fn test_negative_cost_is_floored() {
    let record = CostRecord::new("qa", "m", 10, -3.0);
    assert_eq!(record.cost_usd, 0.0);
}

#[tokio::test]
async fn test_rolling_windows() {
    let store = Arc::new(MemoryCostStore::new());
    let now = Utc::now();

    store
        .append(&CostRecord::new("qa", "m", 100, 0.4).at(now - Duration::hours(1)))
        .await
        .unwrap();
    store
        .append(&CostRecord::new("risk", "m", 200, 0.7).at(now - Duration::days(2)))
        .await
        .unwrap();
    store
        .append(&CostRecord::new("qa", "m", 300, 9.0).at(now - Duration::days(8)))
        .await
        .unwrap();

    let guard = CostGuard::new(store, config());
    let stats = guard.stats_at(now).await.unwrap();

    assert!((stats.daily_total - 0.4).abs() < 1e-9);
    assert!((stats.weekly_total - 1.1).abs() < 1e-9);
    assert_eq!(stats.daily_requests, 1);
    assert_eq!(stats.weekly_requests, 2);
    assert!(!stats.daily_exceeded);
    assert!(!stats.weekly_exceeded);
    assert_eq!(stats.by_agent["qa"].tokens, 100);
    assert_eq!(stats.by_agent["risk"].requests, 1);
}

#[tokio::test]
async fn test_overage_is_reported_not_refused() {
    let guard = CostGuard::new(Arc::new(MemoryCostStore::new()), config());

    guard.record("qa", "m", 1_000, 0.8).await.unwrap();
    guard.record("qa", "m", 1_000, 0.8).await.unwrap();

    let stats = guard.get_stats().await.unwrap();
    assert!(stats.daily_exceeded);
    assert!(!stats.weekly_exceeded);
    assert!(stats.over_budget());
    assert_eq!(stats.daily_cap, 1.0);
}

#[tokio::test]
async fn test_sqlite_cost_store() {
    let events = EventStore::in_memory().await.unwrap();
    let store = SqliteCostStore::new(events.pool().clone());
    store.migrate().await.unwrap();

    let now = Utc::now();
    let old = CostRecord::new("qa", "m", 10, 1.0).at(now - Duration::days(10));
    let recent = CostRecord::new("risk", "m", 20, 2.0)
        .with_conversation("c1")
        .at(now - Duration::minutes(5));
    store.append(&old).await.unwrap();
    store.append(&recent).await.unwrap();

    let records = store.records_since(now - Duration::days(7)).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].agent, "risk");
    assert_eq!(records[0].tokens_used, 20);
    assert_eq!(records[0].conversation_id.as_deref(), Some("c1"));

    let guard = CostGuard::new(Arc::new(store), config());
    let stats = guard.stats_at(now).await.unwrap();
    assert!((stats.weekly_total - 2.0).abs() < 1e-9);
    assert!(stats.daily_exceeded);
}

#[tokio::test]
async fn test_cap_check_uses_windowed_spend() {
    let store = Arc::new(MemoryCostStore::new());
    let now = Utc::now();
    store
        .append(&CostRecord::new("qa", "m", 10, 4.5).at(now - Duration::days(3)))
        .await
        .unwrap();

    let guard = CostGuard::new(store.clone(), config());
    assert!(!guard.check_caps(now).await.unwrap());

    store
        .append(&CostRecord::new("qa", "m", 10, 0.75).at(now - Duration::minutes(1)))
        .await
        .unwrap();
    assert!(guard.check_caps(now).await.unwrap());
    assert!((store.spend_since(now - Duration::hours(24)).await.unwrap() - 0.75).abs() < 1e-9);
}

#[tokio::test]
async fn test_sqlite_spend_since() {
    let events = EventStore::in_memory().await.unwrap();
    let store = SqliteCostStore::new(events.pool().clone());
    store.migrate().await.unwrap();

    let now = Utc::now();
    assert_eq!(store.spend_since(now - Duration::days(7)).await.unwrap(), 0.0);

    store
        .append(&CostRecord::new("qa", "m", 10, 1.25).at(now - Duration::days(2)))
        .await
        .unwrap();
    store
        .append(&CostRecord::new("qa", "m", 10, 0.5).at(now - Duration::hours(2)))
        .await
        .unwrap();

    let week = store.spend_since(now - Duration::days(7)).await.unwrap();
    let day = store.spend_since(now - Duration::hours(24)).await.unwrap();
    assert!((week - 1.75).abs() < 1e-9);
    assert!((day - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_agent_token_totals_saturate() {
    let guard = CostGuard::new(Arc::new(MemoryCostStore::new()), config());
    guard.record("qa", "m", u64::MAX, 0.0).await.unwrap();
    guard.record("qa", "m", 5, 0.0).await.unwrap();

    let stats = guard.get_stats().await.unwrap();
    assert_eq!(stats.by_agent["qa"].tokens, u64::MAX);
    assert_eq!(stats.by_agent["qa"].requests, 2);
}

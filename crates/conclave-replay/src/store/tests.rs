//! Tests for store module

use super::*;
use crate::event::{EventAction, LogEvent, LogLevel};
use chrono::Duration;

#[test]
fn test_default_data_dir() {
    let dir = default_data_dir();
    assert!(dir.to_string_lossy().contains("conclave"));
    assert!(default_db_path().ends_with("conclave.db"));
}

#[test]
fn test_timestamp_format_is_fixed_width() {
    let ts = crate::event::timestamp_now();
    let formatted = format_timestamp(ts);
    assert_eq!(formatted.len(), "2026-01-01T00:00:00.000000Z".len());
    assert_eq!(parse_timestamp(&formatted).unwrap(), ts);
}

#[tokio::test]
async fn test_in_memory_sqlite_store() {
    let store = EventStore::in_memory().await.unwrap();
    assert_eq!(store.name(), "sqlite");

    let started = LogEvent::new("c1", "system", EventAction::ConversationStarted)
        .with_data(serde_json::json!({"prompt": "reserve stock"}));
    store.append(started.clone()).await.unwrap();
    store
        .append(LogEvent::new("other", "system", EventAction::ConversationStarted))
        .await
        .unwrap();

    let events = store.get_events("c1").await.unwrap();
    assert_eq!(events, vec![started]);
    assert_eq!(store.count_events("c1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_sqlite_orders_by_timestamp_then_append_order() {
    let store = EventStore::in_memory().await.unwrap();
    let base = crate::event::timestamp_now();

    let late = LogEvent::new("c1", "b", EventAction::AgentResponse).at(base + Duration::seconds(5));
    let first = LogEvent::new("c1", "a", EventAction::AgentResponse).at(base);
    let second = LogEvent::new("c1", "c", EventAction::AgentResponse)
        .at(base)
        .with_level(LogLevel::Warn);

    store.append(late.clone()).await.unwrap();
    store.append(first.clone()).await.unwrap();
    store.append(second.clone()).await.unwrap();

    let events = store.get_events("c1").await.unwrap();
    let agents: Vec<_> = events.iter().map(|e| e.agent.as_str()).collect();
    assert_eq!(agents, vec!["a", "c", "b"]);
    assert_eq!(events[1].level, LogLevel::Warn);
}

#[tokio::test]
async fn test_events_since_range_query() {
    let store = EventStore::in_memory().await.unwrap();
    let now = crate::event::timestamp_now();

    store
        .append(LogEvent::new("old", "system", EventAction::ConversationStarted).at(now - Duration::days(2)))
        .await
        .unwrap();
    store
        .append(LogEvent::new("new", "system", EventAction::ConversationStarted).at(now))
        .await
        .unwrap();

    let recent = store
        .get_events_since(now - Duration::hours(1), 10)
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].conversation_id, "new");

    let limited = store.get_events_since(now - Duration::days(3), 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].conversation_id, "old");
}

#[tokio::test]
async fn test_sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log").join("conclave.db");

    let event = LogEvent::new("c1", "system", EventAction::ConversationCompleted)
        .with_final_decision("approved");
    {
        let store = EventStore::from_path(&path).await.unwrap();
        store.append(event.clone()).await.unwrap();
        store.pool().close().await;
    }

    let reopened = EventStore::from_path(&path).await.unwrap();
    let events = reopened.get_events("c1").await.unwrap();
    assert_eq!(events, vec![event]);
}

#[tokio::test]
async fn test_memory_store_offline() {
    let store = MemoryEventStore::new();
    assert_eq!(store.name(), "memory");

    store
        .append(LogEvent::new("c1", "system", EventAction::ConversationStarted))
        .await
        .unwrap();

    store.set_available(false);
    let err = store
        .append(LogEvent::new("c1", "a", EventAction::AgentResponse))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(store.get_events("c1").await.is_err());

    store.set_available(true);
    assert_eq!(store.get_events("c1").await.unwrap().len(), 1);
    assert_eq!(store.len().await, 1);
}

use super::*;
use crate::approval::{ApprovalFilter, ApprovalStatus, Verdict};
use crate::config::{DispatchConfig, EscalationPolicy};
use crate::dispatcher::{AgentError, AgentOutput};
use crate::testing::ScriptedInvoker;
use conclave_replay::{
    ConsensusRule, ConversationStatus, Decision, Enforcement, EventAction, Severity,
};
use std::time::Duration;

fn config() -> CoreConfig {
    CoreConfig {
        dispatch: DispatchConfig {
            agent_timeout_secs: 1,
            max_parallel: 4,
        },
        ..Default::default()
    }
}

fn service(invoker: ScriptedInvoker) -> (DecisionService, ServiceStores) {
    let stores = ServiceStores::in_memory();
    let service = DecisionService::init(config(), stores.clone(), Arc::new(invoker)).unwrap();
    (service, stores)
}

fn roles(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_init_rejects_invalid_config() {
    let mut bad = config();
    bad.consensus.veto_threshold = -0.1;
    let result = DecisionService::init(
        bad,
        ServiceStores::in_memory(),
        Arc::new(ScriptedInvoker::new()),
    );
    assert!(matches!(result, Err(Error::InvalidConfig { .. })));
}

#[tokio::test]
async fn test_single_agent_conversation() {
    let (service, _) = service(ScriptedInvoker::new().answer("qa", Decision::Approved, 0.8));

    let outcome = service
        .start_conversation("qa", &DecisionRequest::new("release lot 5"), None)
        .await
        .unwrap();

    assert_eq!(outcome.final_decision, FinalDecision::Approved);
    let result = outcome.protocol_result.unwrap();
    assert!(result.consensus);
    assert_eq!(result.rule, ConsensusRule::SingleAgent);
    assert_eq!(outcome.conversation.status, ConversationStatus::Completed);
    assert_eq!(outcome.conversation.responses.len(), 1);
}

#[tokio::test]
async fn test_veto_scenario() {
    let (service, _) = service(
        ScriptedInvoker::new()
            .answer("a", Decision::Approved, 0.6)
            .answer("b", Decision::Approved, 0.7)
            .answer("c", Decision::Rejected, 0.95),
    );

    let outcome = service
        .start_multi_agent_conversation(&roles(&["a", "b", "c"]), &DecisionRequest::new("x"), None)
        .await
        .unwrap();

    assert_eq!(outcome.final_decision, FinalDecision::Rejected);
    assert!(!outcome.protocol_result.as_ref().unwrap().consensus);
    assert!(outcome.is_blocking());
}

#[tokio::test]
async fn test_advisory_rejection_does_not_block() {
    let stores = ServiceStores::in_memory();
    let mut config = config();
    config.consensus.enforcement = Enforcement::Advise;
    let service = DecisionService::init(
        config,
        stores,
        Arc::new(ScriptedInvoker::new().answer("qa", Decision::Rejected, 0.9)),
    )
    .unwrap();

    let outcome = service
        .start_conversation("qa", &DecisionRequest::new("x"), None)
        .await
        .unwrap();
    assert_eq!(outcome.final_decision, FinalDecision::Rejected);
    assert!(!outcome.is_blocking());
}

#[tokio::test]
async fn test_timeout_still_finalizes() {
    let (service, _) = service(
        ScriptedInvoker::new()
            .answer("qa", Decision::Approved, 0.7)
            .answer("risk", Decision::Approved, 0.6)
            .hang("legacy"),
    );

    let outcome = service
        .start_multi_agent_conversation(
            &roles(&["qa", "risk", "legacy"]),
            &DecisionRequest::new("x"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome.final_decision, FinalDecision::Approved);
    assert!(outcome.protocol_result.as_ref().unwrap().consensus);

    let legacy = outcome
        .conversation
        .responses
        .iter()
        .find(|r| r.agent == "legacy")
        .unwrap();
    assert_eq!(legacy.decision, Decision::NoResponse);
    assert_eq!(legacy.confidence, 0.0);
}

#[tokio::test]
async fn test_total_dispatch_failure() {
    let (service, _) = service(
        ScriptedInvoker::new()
            .fail("a", AgentError::Transport("refused".into()))
            .fail("b", AgentError::Remote("500".into())),
    );

    let err = service
        .start_multi_agent_conversation(
            &roles(&["a", "b"]),
            &DecisionRequest::new("x"),
            Some("c1".into()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TotalDispatchFailure { ref conversation_id, .. } if conversation_id == "c1"));

    let conversation = service.get_conversation_history("c1").await.unwrap();
    assert_eq!(conversation.status, ConversationStatus::Failed);
    assert_eq!(conversation.final_decision, Some(FinalDecision::Failed));
    assert_eq!(conversation.responses.len(), 2);
}

#[tokio::test]
async fn test_single_agent_failure_is_total() {
    let (service, _) = service(ScriptedInvoker::new());

    let err = service
        .start_conversation("missing", &DecisionRequest::new("x"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TotalDispatchFailure { .. }));
}

#[tokio::test]
async fn test_critical_split_vote_escalates() {
    let (service, stores) = service(
        ScriptedInvoker::new()
            .answer("a", Decision::Approved, 0.6)
            .answer("b", Decision::Conditional, 0.5),
    );
    let request = DecisionRequest::new("scrap 200 units").with_severity(Severity::Critical);

    let outcome = service
        .start_multi_agent_conversation(&roles(&["a", "b"]), &request, Some("c1".into()))
        .await
        .unwrap();

    assert_eq!(outcome.final_decision, FinalDecision::Escalated);
    assert_eq!(outcome.conversation.status, ConversationStatus::Completed);
    let result = outcome.protocol_result.unwrap();
    assert_eq!(result.proposed_decision, Decision::Approved);
    let escalation = result.escalation.unwrap();

    let approval = service
        .approvals()
        .get(escalation.approval_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(approval.agent, ESCALATION_AGENT);
    assert_eq!(approval.action, "escalate:c1");
    assert_eq!(approval.conversation_id.as_deref(), Some("c1"));
    assert_eq!(approval.status, ApprovalStatus::Pending);

    let events = stores.events.get_events("c1").await.unwrap();
    assert!(events
        .iter()
        .any(|e| e.action == EventAction::ConversationEscalated));

    let decided = service
        .approvals()
        .decide(escalation.approval_id, Verdict::Approved)
        .await
        .unwrap();
    assert_eq!(decided.status, ApprovalStatus::Approved);
}

#[tokio::test]
async fn test_unanimous_critical_vote_is_not_escalated() {
    let (service, _) = service(
        ScriptedInvoker::new()
            .answer("a", Decision::Approved, 0.6)
            .answer("b", Decision::Approved, 0.5),
    );
    let request = DecisionRequest::new("x").with_severity(Severity::Critical);

    let outcome = service
        .start_multi_agent_conversation(&roles(&["a", "b"]), &request, None)
        .await
        .unwrap();
    assert_eq!(outcome.final_decision, FinalDecision::Approved);

    let waiting = service
        .approvals()
        .counts(&ApprovalFilter::new())
        .await
        .unwrap();
    assert_eq!(waiting.total(), 0);
}

#[tokio::test]
async fn test_always_escalate_single_agent() {
    let mut config = config();
    config.consensus.escalation = EscalationPolicy {
        always_severities: vec![Severity::High],
        ..EscalationPolicy::disabled()
    };
    let service = DecisionService::init(
        config,
        ServiceStores::in_memory(),
        Arc::new(ScriptedInvoker::new().answer("qa", Decision::Approved, 0.99)),
    )
    .unwrap();

    let outcome = service
        .start_conversation("qa", &DecisionRequest::new("x").with_severity(Severity::High), None)
        .await
        .unwrap();
    assert_eq!(outcome.final_decision, FinalDecision::Escalated);
}

#[tokio::test]
async fn test_manual_stop_during_dispatch() {
    let stores = ServiceStores::in_memory();
    let service = Arc::new(
        DecisionService::init(
            config(),
            stores.clone(),
            Arc::new(
                ScriptedInvoker::new()
                    .answer_after("a", Decision::Approved, 0.9, Duration::from_millis(400))
                    .answer_after("b", Decision::Approved, 0.9, Duration::from_millis(400)),
            ),
        )
        .unwrap(),
    );

    let running = tokio::spawn({
        let service = service.clone();
        async move {
            service
                .start_multi_agent_conversation(
                    &roles(&["a", "b"]),
                    &DecisionRequest::new("x"),
                    Some("c1".into()),
                )
                .await
        }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let stopped = service.manually_stop("c1", "operator abort").await.unwrap();
    assert_eq!(stopped.final_decision, Some(FinalDecision::Stopped));

    let outcome = running.await.unwrap().unwrap();
    assert_eq!(outcome.final_decision, FinalDecision::Stopped);
    assert_eq!(outcome.conversation.status, ConversationStatus::Failed);
    assert!(outcome.conversation.responses.is_empty());

    // Stopping again is a no-op
    let again = service.manually_stop("c1", "again").await.unwrap();
    assert_eq!(again, outcome.conversation);

    let events = stores.events.get_events("c1").await.unwrap();
    let mut late: Vec<_> = events
        .iter()
        .filter(|e| e.action == EventAction::LateAgentResponse)
        .map(|e| e.agent.as_str())
        .collect();
    late.sort_unstable();
    assert_eq!(late, vec!["a", "b"]);
    assert!(!events
        .iter()
        .any(|e| e.action == EventAction::AgentResponse));
    assert_eq!(
        events.iter().filter(|e| e.action.is_terminal()).count(),
        1
    );
}

fn assert_send<T: Send>(_: &T) {}

#[test]
fn test_entry_point_futures_are_send() {
    let (service, _) = service(ScriptedInvoker::new());
    let request = DecisionRequest::new("x");
    let roles = roles(&["a", "b"]);

    assert_send(&service.start_conversation("a", &request, None));
    assert_send(&service.start_multi_agent_conversation(&roles, &request, None));
    assert_send(&service.manually_stop("c1", "operator"));
    assert_send(&service.get_conversation_history("c1"));
}

#[tokio::test]
async fn test_duplicate_id_rejected() {
    let (service, _) = service(ScriptedInvoker::new().answer("qa", Decision::Approved, 0.8));
    let request = DecisionRequest::new("x");

    service
        .start_conversation("qa", &request, Some("c1".into()))
        .await
        .unwrap();
    let err = service
        .start_conversation("qa", &request, Some("c1".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateConversation(_)));
}

#[tokio::test]
async fn test_empty_roles_rejected() {
    let (service, _) = service(ScriptedInvoker::new());
    let err = service
        .start_multi_agent_conversation(&[], &DecisionRequest::new("x"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    assert!(service.get_all_conversations().await.is_empty());
}

#[tokio::test]
async fn test_history_after_shutdown_comes_from_log() {
    let (service, _) = service(ScriptedInvoker::new().answer("qa", Decision::Approved, 0.8));
    let outcome = service
        .start_conversation("qa", &DecisionRequest::new("x"), Some("c1".into()))
        .await
        .unwrap();

    assert_eq!(service.shutdown().await, 0);
    assert!(!service.is_accepting());
    assert!(service.get_all_conversations().await.is_empty());

    let history = service.get_conversation_history("c1").await.unwrap();
    assert_eq!(history, outcome.conversation);

    let err = service
        .start_conversation("qa", &DecisionRequest::new("y"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));
    assert!(matches!(
        service.get_conversation_history("nope").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_usage_flows_into_cost_stats() {
    let (service, _) = service(ScriptedInvoker::new().output_after(
        "qa",
        AgentOutput::new(Decision::Approved, "ok", 0.8).with_usage("m", 1_000, Some(0.12)),
        Duration::ZERO,
    ));

    service
        .start_conversation("qa", &DecisionRequest::new("x"), None)
        .await
        .unwrap();

    let stats = service.costs().get_stats().await.unwrap();
    assert_eq!(stats.daily_requests, 1);
    assert!((stats.daily_total - 0.12).abs() < 1e-9);
}

use creditledger::ledger::ALREADY_IN_FLIGHT;
use creditledger::wire::{ConsumeResponse, UserInfoResponse};
use creditledger::{CreditEvent, CreditLedger, MockTransport, Remaining, TransportError};
use std::sync::Arc;
use std::time::Duration;

async fn ledger_with_balance(remaining: i64, mock: MockTransport, dedupe: bool) -> (Arc<CreditLedger>, Arc<MockTransport>) {
    let mock = Arc::new(mock.with_user_info(
        "/api/user-info",
        Ok(UserInfoResponse::with_credits(remaining, 50, "daily", "free")),
    ));
    let ledger = CreditLedger::builder()
        .transport(mock.clone())
        .dedupe_in_flight(dedupe)
        .build_and_initialize()
        .await
        .unwrap();
    (ledger, mock)
}

#[tokio::test]
async fn test_server_refusal_leaves_state_unchanged() {
    let (ledger, mock) = ledger_with_balance(
        20,
        MockTransport::new().with_consume(Ok(ConsumeResponse::rejected("Daily limit reached"))),
        false,
    ).await;

    let result = ledger.consume_credits("prime_agent_task", None).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Daily limit reached"));
    assert_eq!(ledger.get_credit_status().remaining, Remaining::Finite(20));
    assert_eq!(mock.consume_calls(), 1);
}

#[tokio::test]
async fn test_transport_error_is_returned_not_raised() {
    let (ledger, _) = ledger_with_balance(
        20,
        MockTransport::new().with_consume(Err(TransportError::Network("connection reset".into()))),
        false,
    ).await;

    let result = ledger.consume_credits("prime_agent_task", None).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("connection reset"));
    assert_eq!(ledger.get_credit_status().remaining, Remaining::Finite(20));
}

#[tokio::test]
async fn test_http_status_error_is_returned() {
    let (ledger, _) = ledger_with_balance(
        20,
        MockTransport::new().with_consume(Err(TransportError::Status {
            status:  402,
            message: "Payment required".into(),
        })),
        false,
    ).await;

    let result = ledger.consume_credits("simple_search", None).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("402"));
}

#[tokio::test]
async fn test_missing_remaining_is_treated_as_failure() {
    let response = ConsumeResponse { success: true, credits_consumed: Some(5), ..Default::default() };
    let (ledger, _) = ledger_with_balance(20, MockTransport::new().with_consume(Ok(response)), false).await;

    let result = ledger.consume_credits("prime_agent_task", None).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("remaining_credits"));
    assert_eq!(ledger.get_credit_status().remaining, Remaining::Finite(20));
}

#[tokio::test]
async fn test_negative_remaining_for_metered_account_is_rejected() {
    let (ledger, _) = ledger_with_balance(
        40,
        MockTransport::new().with_consume(Ok(ConsumeResponse::ok(5, -1))),
        false,
    ).await;

    let result = ledger.consume_credits("prime_agent_task", None).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("negative remaining_credits"));
    assert_eq!(ledger.get_credit_status().remaining, Remaining::Finite(40));
    assert!(!ledger.check_credits("research_comprehensive", None).await.allowed);
}

#[tokio::test]
async fn test_custom_amount_is_sent_to_server() {
    let (ledger, mock) = ledger_with_balance(
        20,
        MockTransport::new().with_consume(Ok(ConsumeResponse::ok(3, 17))),
        false,
    ).await;

    let result = ledger.consume_credits("research_comprehensive", Some(3)).await;
    assert!(result.success, "custom amount 3 fits even though the table cost is 30");
    assert_eq!(result.consumed, Some(3));
    assert_eq!(mock.consume_requests()[0].amount, Some(3));
}

#[tokio::test]
async fn test_consumed_defaults_to_cost_when_server_omits_it() {
    let response = ConsumeResponse { success: true, remaining_credits: Some(12), ..Default::default() };
    let (ledger, _) = ledger_with_balance(20, MockTransport::new().with_consume(Ok(response)), false).await;

    let result = ledger.consume_credits("prime_agent_complex", None).await;
    assert_eq!(result.consumed, Some(8));
    assert_eq!(result.remaining, Some(Remaining::Finite(12)));
}

#[tokio::test]
async fn test_consume_emits_event_with_new_status() {
    let (ledger, _) = ledger_with_balance(
        20,
        MockTransport::new().with_consume(Ok(ConsumeResponse::ok(5, 15))),
        false,
    ).await;
    let mut events = ledger.subscribe();

    ledger.consume_credits("prime_agent_task", None).await;

    match events.try_recv().expect("an event should be queued") {
        CreditEvent::Consumed { task_type, consumed, status } => {
            assert_eq!(task_type, "prime_agent_task");
            assert_eq!(consumed, 5);
            assert_eq!(status.remaining, Remaining::Finite(15));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_enforce_failure_emits_notice() {
    let (ledger, _) = ledger_with_balance(2, MockTransport::new(), false).await;
    let mut events = ledger.subscribe();

    assert!(!ledger.enforce_credits("agent_wave_document", None).await);

    match events.try_recv().unwrap() {
        CreditEvent::InsufficientCredits(notice) => {
            assert_eq!(notice.cost, 10);
            assert_eq!(notice.needed, 8);
            assert_eq!(notice.remaining, Remaining::Finite(2));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_dropped_subscriber_does_not_block_others() {
    let (ledger, _) = ledger_with_balance(
        20,
        MockTransport::new().with_consume(Ok(ConsumeResponse::ok(1, 19))),
        false,
    ).await;
    let dropped = ledger.subscribe();
    let mut kept = ledger.subscribe();
    drop(dropped);

    ledger.consume_credits("chat_message", None).await;
    assert!(kept.try_recv().is_ok());
}

#[tokio::test]
async fn test_trace_records_operations() {
    let (ledger, _) = ledger_with_balance(
        20,
        MockTransport::new().with_consume(Ok(ConsumeResponse::ok(5, 15))),
        false,
    ).await;

    ledger.consume_credits("prime_agent_task", None).await;
    ledger.consume_credits("research_comprehensive", None).await;

    let trace = ledger.trace();
    let ops: Vec<&str> = trace.iter().map(|e| e.operation.as_str()).collect();
    assert_eq!(ops, vec!["initialize", "consume", "consume"]);
    assert!(trace[2].detail.contains("rejected locally"));
    assert_eq!(trace[1].task_type.as_deref(), Some("prime_agent_task"));
    assert!(trace.windows(2).all(|w| w[0].seq < w[1].seq));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_consumes_are_not_serialized_by_default() {
    let (ledger, mock) = ledger_with_balance(
        20,
        MockTransport::new()
            .with_consume_delay(Duration::from_millis(200))
            .with_consume(Ok(ConsumeResponse::ok(5, 15)))
            .with_consume(Ok(ConsumeResponse::ok(5, 10))),
        false,
    ).await;

    let (a, b) = futures::join!(
        ledger.consume_credits("prime_agent_task", None),
        ledger.consume_credits("prime_agent_task", None),
    );

    assert!(a.success && b.success);
    assert_eq!(mock.consume_calls(), 2, "both debits reach the server");
}

#[tokio::test(start_paused = true)]
async fn test_dedupe_rejects_duplicate_in_flight_consume() {
    let (ledger, mock) = ledger_with_balance(
        20,
        MockTransport::new()
            .with_consume_delay(Duration::from_millis(200))
            .with_consume(Ok(ConsumeResponse::ok(5, 15)))
            .with_consume(Ok(ConsumeResponse::ok(1, 14))),
        true,
    ).await;

    let (a, b, c) = futures::join!(
        ledger.consume_credits("prime_agent_task", None),
        ledger.consume_credits("prime_agent_task", None),
        ledger.consume_credits("chat_message", None),
    );

    assert!(a.success);
    assert!(!b.success);
    assert_eq!(b.error.as_deref(), Some(ALREADY_IN_FLIGHT));
    assert!(c.success, "other task types are not blocked");
    assert_eq!(mock.consume_calls(), 2);
}

#[tokio::test]
async fn test_dedupe_slot_is_released_after_completion() {
    let (ledger, mock) = ledger_with_balance(
        20,
        MockTransport::new()
            .with_consume(Ok(ConsumeResponse::ok(5, 15)))
            .with_consume(Ok(ConsumeResponse::ok(5, 10))),
        true,
    ).await;

    assert!(ledger.consume_credits("prime_agent_task", None).await.success);
    assert!(ledger.consume_credits("prime_agent_task", None).await.success);
    assert_eq!(mock.consume_calls(), 2);
}

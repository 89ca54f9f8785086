use creditledger::wire::UserInfoResponse;
use creditledger::{
    CreditEvent, CreditLedger, MockTransport, Plan, RefreshScheduler, Remaining,
};
use std::sync::Arc;
use std::time::Duration;

const PRIMARY: &str = "/api/user-info";

fn free(remaining: i64) -> UserInfoResponse {
    UserInfoResponse::with_credits(remaining, 50, "daily", "free")
}

async fn setup(responses: Vec<UserInfoResponse>) -> (Arc<CreditLedger>, Arc<MockTransport>) {
    let mock = Arc::new(MockTransport::new());
    for r in responses {
        mock.push_user_info(PRIMARY, Ok(r));
    }
    let ledger = CreditLedger::builder()
        .transport(mock.clone())
        .build_and_initialize()
        .await
        .unwrap();
    (ledger, mock)
}

/// Let the spawned refresh loop run without moving the clock far.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_periodic_refresh_picks_up_server_balance() {
    let (ledger, mock) = setup(vec![free(50), free(30)]).await;
    let handle = RefreshScheduler::start(Arc::clone(&ledger));

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(mock.user_info_calls(), 1, "no refresh before the interval elapses");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(mock.user_info_calls(), 2);
    assert_eq!(ledger.get_credit_status().remaining, Remaining::Finite(30));

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_previous_state() {
    let (ledger, _) = setup(vec![free(20)]).await;
    let mut events = ledger.subscribe();
    let handle = RefreshScheduler::start(Arc::clone(&ledger));

    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(ledger.get_credit_status().remaining, Remaining::Finite(20));
    assert!(matches!(events.try_recv(), Ok(CreditEvent::RefreshFailed { .. })));

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_nudges_respect_min_refresh_interval() {
    let (ledger, mock) = setup(vec![free(50), free(40), free(35)]).await;
    let handle = RefreshScheduler::start(Arc::clone(&ledger));

    // initialize just ran, so an immediate nudge is skipped
    handle.visibility_regained();
    settle().await;
    assert_eq!(mock.user_info_calls(), 1);

    tokio::time::sleep(Duration::from_secs(11)).await;
    handle.window_focused();
    settle().await;
    assert_eq!(mock.user_info_calls(), 2);
    assert_eq!(ledger.get_credit_status().remaining, Remaining::Finite(40));

    // a burst right after is collapsed
    handle.visibility_regained();
    handle.window_focused();
    settle().await;
    assert_eq!(mock.user_info_calls(), 2);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_ends_the_loop() {
    let (ledger, mock) = setup(vec![free(50), free(45), free(40)]).await;
    let handle = RefreshScheduler::start(Arc::clone(&ledger));
    assert!(handle.is_running());

    handle.stop().await;
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(mock.user_info_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_aborts_the_loop() {
    let (ledger, mock) = setup(vec![free(50), free(45)]).await;
    let handle = RefreshScheduler::start(Arc::clone(&ledger));

    drop(handle);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(mock.user_info_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_if_stale_skips_recent_refresh() {
    let (ledger, mock) = setup(vec![free(50), free(25)]).await;

    assert!(ledger.refresh_if_stale().await.is_none());
    assert_eq!(mock.user_info_calls(), 1);

    tokio::time::advance(Duration::from_secs(10)).await;
    let status = ledger.refresh_if_stale().await.expect("stale by now").unwrap();
    assert_eq!(status.remaining, Remaining::Finite(25));
}

#[tokio::test]
async fn test_refresh_emits_update_only_on_change() {
    let (ledger, _) = setup(vec![free(50), free(50), free(44)]).await;
    let mut events = ledger.subscribe();

    ledger.refresh_from_server().await.unwrap();
    assert!(events.try_recv().is_err(), "unchanged balance must not notify");

    ledger.refresh_from_server().await.unwrap();
    match events.try_recv().unwrap() {
        CreditEvent::Updated(status) => assert_eq!(status.remaining, Remaining::Finite(44)),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_update_plan_resyncs_with_server() {
    let (ledger, _) = setup(vec![
        free(3),
        UserInfoResponse::with_credits(500, 500, "monthly", "pro"),
    ]).await;
    let mut events = ledger.subscribe();

    let status = ledger.update_plan(Plan::Pro).await;
    assert_eq!(status.plan, Plan::Pro);
    assert_eq!(status.remaining, Remaining::Finite(500));

    match events.try_recv().unwrap() {
        CreditEvent::Updated(local) => {
            assert_eq!(local.plan, Plan::Pro);
            assert_eq!(local.remaining, Remaining::Finite(3), "balance untouched until the server answers");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_update_plan_survives_failed_resync() {
    let (ledger, _) = setup(vec![free(3)]).await;

    let status = ledger.update_plan(Plan::Admin).await;
    assert_eq!(status.plan, Plan::Admin);
    assert!(status.is_admin);
    assert!(status.unlimited);
    assert_eq!(status.remaining, Remaining::Finite(3));
    assert!(ledger.check_credits("research_comprehensive", None).await.allowed);
}

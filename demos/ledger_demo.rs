//! Gate, run and debit a few tasks against a credit backend.
//!
//! Uses the HTTP backend when `CREDIT_LEDGER_BASE_URL` is set, otherwise a
//! scripted in-process backend.
//!
//! Run with: `RUST_LOG=creditledger=debug cargo run --example ledger_demo`

use std::sync::Arc;
use creditledger::config::{self, LedgerConfig};
use creditledger::wire::{ConsumeResponse, UserInfoResponse};
use creditledger::{
    CreditDisplay, CreditEvent, CreditLedger, CreditTransport, MockTransport, RefreshScheduler,
};

fn offline_backend() -> Arc<dyn CreditTransport> {
    Arc::new(
        MockTransport::new()
            .with_user_info("/api/user-info", Ok(UserInfoResponse::with_credits(12, 50, "daily", "free")))
            .with_consume(Ok(ConsumeResponse::ok(5, 7)))
            .with_consume(Ok(ConsumeResponse::ok(5, 2))),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = LedgerConfig::from_env();
    let mut builder = CreditLedger::builder()
        .cost_table(config::cost_table_from_env()?)
        .config(config.clone());
    if config.base_url.is_none() {
        println!("CREDIT_LEDGER_BASE_URL not set, using the offline backend");
        builder = builder.transport(offline_backend());
    }

    let ledger = builder.build_and_initialize().await?;
    let mut events = ledger.subscribe();
    let refresher = RefreshScheduler::start(Arc::clone(&ledger));

    let status = ledger.get_credit_status();
    let display = CreditDisplay::from_status(&status);
    println!("Plan {}: {} {}", display.plan_label, display.text, display.period_label);

    for task in ["prime_agent_task", "prime_agent_task", "agent_wave_document"] {
        if !ledger.enforce_credits(task, None).await {
            println!("  {:<22} blocked", task);
            continue;
        }
        let result = ledger.consume_credits(task, None).await;
        match (result.success, result.remaining, result.error) {
            (true, Some(remaining), _) => println!("  {:<22} ok, {} left", task, remaining),
            (_, _, error) => println!("  {:<22} failed: {}", task, error.unwrap_or_default()),
        }
    }

    while let Ok(event) = events.try_recv() {
        if let CreditEvent::InsufficientCredits(notice) = event {
            println!("\n{}", notice.message);
        }
    }

    refresher.stop().await;
    Ok(())
}

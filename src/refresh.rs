use std::sync::Arc;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use crate::ledger::CreditLedger;

/// Background resync of a [`CreditLedger`].
///
/// Every `refresh_interval` the loop calls
/// [`CreditLedger::refresh_from_server`]. Visibility and focus nudges go
/// through [`CreditLedger::refresh_if_stale`], so bursts of them collapse
/// into at most one request per `min_refresh_interval`.
pub struct RefreshScheduler;

impl RefreshScheduler {
    /// Spawn the refresh loop on the current tokio runtime.
    pub fn start(ledger: Arc<CreditLedger>) -> RefreshHandle {
        let period = ledger.config().refresh_interval();
        let nudge = Arc::new(Notify::new());
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let loop_nudge = Arc::clone(&nudge);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let _ = ledger.refresh_from_server().await;
                    }
                    _ = loop_nudge.notified() => {
                        let _ = ledger.refresh_if_stale().await;
                    }
                }
            }
            tracing::debug!("credit refresh loop stopped");
        });

        tracing::debug!(period_s = period.as_secs(), "credit refresh loop started");
        RefreshHandle { nudge, stop: Some(stop_tx), task: Some(task) }
    }
}

/// Owns the refresh loop. Dropping the handle aborts the loop.
pub struct RefreshHandle {
    nudge: Arc<Notify>,
    stop:  Option<oneshot::Sender<()>>,
    task:  Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// The host became visible again (tab shown, window restored).
    pub fn visibility_regained(&self) {
        self.nudge.notify_one();
    }

    /// The host regained input focus.
    pub fn window_focused(&self) {
        self.nudge.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop and wait for an in-progress refresh to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

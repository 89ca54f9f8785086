use std::sync::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use crate::display::InsufficientCreditsNotice;
use crate::types::CreditStatus;

/// Notifications emitted by the ledger whenever the mirrored balance or
/// plan changes, or a gate rejects a task.
///
/// Display widgets subscribe to these instead of polling the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CreditEvent {
    /// First successful (or defaulted) sync
    Initialized(CreditStatus),
    /// Balance or plan changed after a refresh or plan update
    Updated(CreditStatus),
    /// The server accepted a debit
    Consumed {
        task_type: String,
        consumed:  u32,
        status:    CreditStatus,
    },
    /// `enforce_credits` blocked a task
    InsufficientCredits(InsufficientCreditsNotice),
    /// A background or explicit resync failed; prior state kept
    RefreshFailed { error: String },
}

impl CreditEvent {
    /// The status carried by balance-changing events.
    pub fn status(&self) -> Option<&CreditStatus> {
        match self {
            CreditEvent::Initialized(s) | CreditEvent::Updated(s) => Some(s),
            CreditEvent::Consumed { status, .. } => Some(status),
            _ => None,
        }
    }
}

/// Fan-out of events to any number of unbounded subscribers.
/// Closed receivers are pruned on the next emit.
#[derive(Debug, Default)]
pub(crate) struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<CreditEvent>>>,
}

impl EventBus {
    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<CreditEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    pub(crate) fn emit(&self, event: CreditEvent) {
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<CreditEvent>>> {
        self.subscribers.lock().unwrap_or_else(|p| p.into_inner())
    }
}

pub mod types;
pub mod cost;
pub mod config;
pub mod wire;
pub mod transport;
pub mod ledger;
pub mod events;
pub mod display;
pub mod refresh;
pub mod trace;
pub mod error;
pub mod builder;

// Convenience re-exports at crate root
pub use builder::LedgerBuilder;
pub use ledger::CreditLedger;
pub use config::LedgerConfig;
pub use cost::{CostTable, DEFAULT_TASK_COST};
pub use types::{
    CheckResult, ConsumeResult, CreditState, CreditStatus, Plan, QuotaPeriod, Remaining,
    INSUFFICIENT_CREDITS, NOT_INITIALIZED,
};
pub use events::CreditEvent;
pub use display::{CreditDisplay, DisplayLevel, InsufficientCreditsNotice};
pub use refresh::{RefreshHandle, RefreshScheduler};
pub use transport::{CreditTransport, HttpTransport, MockTransport};
pub use trace::{LedgerTrace, TraceEntry};
pub use error::{LedgerError, TransportError};

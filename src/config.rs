use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::cost::CostTable;
use crate::error::LedgerError;

/// Balance assumed for the free-tier fallback state.
pub const DEFAULT_CREDITS: u64 = 50;

pub const ENV_BASE_URL:   &str = "CREDIT_LEDGER_BASE_URL";
pub const ENV_TOKEN:      &str = "CREDIT_LEDGER_TOKEN";
pub const ENV_COST_TABLE: &str = "CREDIT_LEDGER_COST_TABLE";

/// Runtime settings for a [`CreditLedger`](crate::CreditLedger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Backend origin, e.g. `https://app.example.com`
    pub base_url: Option<String>,

    /// User-info endpoints, tried in order until one succeeds
    pub user_info_paths: Vec<String>,

    /// Debit endpoint
    pub consume_path: String,

    /// Sent as a bearer token on every request when set
    pub auth_token: Option<String>,

    /// Per-request timeout. `None` leaves requests unbounded.
    pub request_timeout_secs: Option<u64>,

    /// Period of the background resync
    pub refresh_interval_secs: u64,

    /// Minimum age of the last refresh before a visibility/focus nudge
    /// triggers another one
    pub min_refresh_interval_secs: u64,

    /// Fall back to the free-tier default when initialization fails
    /// instead of returning an error
    pub default_on_failure: bool,

    /// Initialize on the first check if `initialize` was never awaited
    pub lazy_initialize: bool,

    /// Reject a consume for a task type that already has one in flight
    pub dedupe_in_flight: bool,

    /// Balance of the fallback free-tier state
    pub default_credits: u64,

    /// Maximum number of retained trace entries
    pub trace_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url:                  None,
            user_info_paths:           vec![
                "/api/user-info".to_string(),
                "/payment/user-info".to_string(),
            ],
            consume_path:              "/api/consume-credits".to_string(),
            auth_token:                None,
            request_timeout_secs:      None,
            refresh_interval_secs:     30,
            min_refresh_interval_secs: 10,
            default_on_failure:        true,
            lazy_initialize:           true,
            dedupe_in_flight:          false,
            default_credits:           DEFAULT_CREDITS,
            trace_capacity:            256,
        }
    }
}

impl LedgerConfig {
    /// Defaults overlaid with `CREDIT_LEDGER_BASE_URL` and `CREDIT_LEDGER_TOKEN`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.trim().is_empty() {
                config.base_url = Some(url.trim().to_string());
            }
        }
        if let Ok(token) = std::env::var(ENV_TOKEN) {
            if !token.trim().is_empty() {
                config.auth_token = Some(token.trim().to_string());
            }
        }
        config
    }

    pub fn from_json_str(json: &str) -> Result<Self, LedgerError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| LedgerError::Config(format!("Invalid ledger config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.user_info_paths.is_empty() {
            return Err(LedgerError::Config("At least one user-info path is required".to_string()));
        }
        if self.consume_path.trim().is_empty() {
            return Err(LedgerError::Config("consume_path must not be empty".to_string()));
        }
        if self.refresh_interval_secs == 0 {
            return Err(LedgerError::Config("refresh_interval_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.min_refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Built-in cost table merged with the JSON file named by
/// `CREDIT_LEDGER_COST_TABLE`, if set.
pub fn cost_table_from_env() -> Result<CostTable, LedgerError> {
    match std::env::var(ENV_COST_TABLE) {
        Ok(path) if !path.trim().is_empty() => {
            let overrides = CostTable::from_file(path.trim())?;
            Ok(CostTable::builtin().merged(overrides))
        }
        _ => Ok(CostTable::builtin()),
    }
}

use std::sync::Arc;
use crate::config::LedgerConfig;
use crate::cost::CostTable;
use crate::error::LedgerError;
use crate::ledger::CreditLedger;
use crate::transport::{CreditTransport, HttpTransport};

pub struct LedgerBuilder {
    config:    LedgerConfig,
    costs:     CostTable,
    transport: Option<Arc<dyn CreditTransport>>,
}

impl LedgerBuilder {
    pub fn new() -> Self {
        Self {
            config:    LedgerConfig::default(),
            costs:     CostTable::builtin(),
            transport: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: LedgerConfig) -> Self {
        self.config = config; self
    }

    /// Backend origin for the default HTTP transport.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into()); self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth_token = Some(token.into()); self
    }

    /// Use a custom transport instead of HTTP (tests, proxies, offline hosts).
    pub fn transport(mut self, transport: Arc<dyn CreditTransport>) -> Self {
        self.transport = Some(transport); self
    }

    /// Replace the cost table entirely.
    pub fn cost_table(mut self, costs: CostTable) -> Self {
        self.costs = costs; self
    }

    /// Override the cost of one task type.
    ///
    /// # Example
    /// ```no_run
    /// # use creditledger::CreditLedger;
    /// CreditLedger::builder()
    ///     .base_url("https://app.example.com")
    ///     .cost("prime_agent_task", 6)
    ///     .cost("my_custom_tool", 3);
    /// ```
    pub fn cost(mut self, task_type: impl Into<String>, cost: u32) -> Self {
        self.costs = self.costs.with_cost(task_type, cost); self
    }

    pub fn default_on_failure(mut self, enabled: bool) -> Self {
        self.config.default_on_failure = enabled; self
    }

    pub fn lazy_initialize(mut self, enabled: bool) -> Self {
        self.config.lazy_initialize = enabled; self
    }

    pub fn dedupe_in_flight(mut self, enabled: bool) -> Self {
        self.config.dedupe_in_flight = enabled; self
    }

    pub fn refresh_interval_secs(mut self, secs: u64) -> Self {
        self.config.refresh_interval_secs = secs; self
    }

    pub fn min_refresh_interval_secs(mut self, secs: u64) -> Self {
        self.config.min_refresh_interval_secs = secs; self
    }

    /// Builds the ledger without contacting the server. The state starts at
    /// the free-tier default until `initialize` completes.
    pub fn build(self) -> Result<CreditLedger, LedgerError> {
        self.config.validate()?;

        let transport: Arc<dyn CreditTransport> = match self.transport {
            Some(t) => t,
            None => {
                if self.config.base_url.is_none() {
                    return Err(LedgerError::BuildError(
                        "either a transport or a base_url is required".to_string(),
                    ));
                }
                Arc::new(HttpTransport::from_config(&self.config)?)
            }
        };

        Ok(CreditLedger::new(self.config, self.costs, transport))
    }

    /// Builds the ledger and awaits its first sync.
    ///
    /// With `default_on_failure` disabled, a failed sync is returned as
    /// [`LedgerError::Initialization`].
    pub async fn build_and_initialize(self) -> Result<Arc<CreditLedger>, LedgerError> {
        let ledger = self.build()?;
        ledger.initialize().await?;
        Ok(Arc::new(ledger))
    }
}

impl Default for LedgerBuilder {
    fn default() -> Self { Self::new() }
}

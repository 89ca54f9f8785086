use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;
use crate::builder::LedgerBuilder;
use crate::config::LedgerConfig;
use crate::cost::CostTable;
use crate::display::InsufficientCreditsNotice;
use crate::error::{LedgerError, TransportError};
use crate::events::{CreditEvent, EventBus};
use crate::trace::{LedgerTrace, TraceEntry};
use crate::transport::CreditTransport;
use crate::types::{
    CheckResult, ConsumeResult, CreditState, CreditStatus, Plan, RawCredits, Remaining,
    INSUFFICIENT_CREDITS, NOT_INITIALIZED,
};
use crate::wire::ConsumeRequest;

pub const ALREADY_IN_FLIGHT: &str = "Consumption already in progress";

/// Client-side mirror of a user's credit quota.
///
/// Callers gate paid work with [`enforce_credits`](Self::enforce_credits),
/// run the work, then debit with [`consume_credits`](Self::consume_credits).
/// The server is the only writer of the true balance: a successful debit
/// overwrites the mirrored balance with the server's number, and a failed
/// one leaves it untouched.
///
/// None of the gate or debit operations return `Err`; failures are data
/// (`CheckResult::allowed`, `ConsumeResult::success`).
pub struct CreditLedger {
    config:       LedgerConfig,
    costs:        CostTable,
    transport:    Arc<dyn CreditTransport>,
    state:        RwLock<CreditState>,
    initialized:  AtomicBool,
    init_lock:    tokio::sync::Mutex<()>,
    last_refresh: Mutex<Option<DateTime<Utc>>>,
    last_attempt: Mutex<Option<Instant>>,
    in_flight:    Mutex<HashSet<String>>,
    events:       EventBus,
    trace:        Mutex<LedgerTrace>,
}

impl CreditLedger {
    /// Creates a ledger in the free-tier default state. Prefer
    /// [`CreditLedger::builder`] for ergonomic construction.
    pub fn new(
        config:    LedgerConfig,
        costs:     CostTable,
        transport: Arc<dyn CreditTransport>,
    ) -> Self {
        let state = CreditState::free_default(config.default_credits);
        let trace = LedgerTrace::new(config.trace_capacity);
        Self {
            config,
            costs,
            transport,
            state:        RwLock::new(state),
            initialized:  AtomicBool::new(false),
            init_lock:    tokio::sync::Mutex::new(()),
            last_refresh: Mutex::new(None),
            last_attempt: Mutex::new(None),
            in_flight:    Mutex::new(HashSet::new()),
            events:       EventBus::default(),
            trace:        Mutex::new(trace),
        }
    }

    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::new()
    }

    // ── Sync with the server ─────────────────────────────

    /// Fetch the user's credits and overwrite the mirrored state.
    ///
    /// User-info endpoints are tried in configured order. When all fail and
    /// `default_on_failure` is set, the state falls back to the free-tier
    /// default and this still returns `Ok`. Safe to call repeatedly.
    pub async fn initialize(&self) -> Result<CreditStatus, LedgerError> {
        *lock(&self.last_attempt) = Some(Instant::now());
        match self.fetch_state().await {
            Ok(state) => {
                tracing::info!(
                    plan      = %state.plan,
                    remaining = %state.remaining,
                    total     = %state.total,
                    "credit ledger initialized"
                );
                self.record("initialize", None, format!("remaining={} plan={}", state.remaining, state.plan));
                self.store(state);
                self.mark_refreshed();
                self.initialized.store(true, Ordering::SeqCst);
                let status = self.get_credit_status();
                self.events.emit(CreditEvent::Initialized(status.clone()));
                Ok(status)
            }
            Err(e) if self.config.default_on_failure => {
                tracing::warn!(error = %e, "user info unavailable — using free-tier defaults");
                self.record("initialize", None, format!("defaulted: {}", e));
                self.store(CreditState::free_default(self.config.default_credits));
                self.initialized.store(true, Ordering::SeqCst);
                let status = self.get_credit_status();
                self.events.emit(CreditEvent::Initialized(status.clone()));
                Ok(status)
            }
            Err(e) => {
                tracing::error!(error = %e, "credit ledger initialization failed");
                self.record("initialize", None, format!("failed: {}", e));
                Err(LedgerError::Initialization(e.to_string()))
            }
        }
    }

    /// Resync with the server. On failure the prior state is kept.
    pub async fn refresh_from_server(&self) -> Result<CreditStatus, LedgerError> {
        match self.fetch_state().await {
            Ok(state) => {
                let changed = *self.read_state() != state;
                tracing::debug!(remaining = %state.remaining, changed, "credit ledger refreshed");
                self.record("refresh", None, format!("remaining={}", state.remaining));
                self.store(state);
                self.mark_refreshed();
                self.initialized.store(true, Ordering::SeqCst);
                let status = self.get_credit_status();
                if changed {
                    self.events.emit(CreditEvent::Updated(status.clone()));
                }
                Ok(status)
            }
            Err(e) => {
                tracing::warn!(error = %e, "credit refresh failed — keeping previous state");
                self.record("refresh", None, format!("failed: {}", e));
                self.events.emit(CreditEvent::RefreshFailed { error: e.to_string() });
                Err(LedgerError::Transport(e))
            }
        }
    }

    /// Refresh unless one was attempted within `min_refresh_interval`.
    /// Returns `None` when skipped.
    pub async fn refresh_if_stale(&self) -> Option<Result<CreditStatus, LedgerError>> {
        {
            let mut last = lock(&self.last_attempt);
            if attempted_recently(*last, self.config.min_refresh_interval()) {
                tracing::debug!("credit refresh skipped — too soon after the last one");
                return None;
            }
            *last = Some(Instant::now());
        }
        Some(self.refresh_from_server().await)
    }

    async fn fetch_state(&self) -> Result<CreditState, TransportError> {
        let mut last_err = TransportError::Malformed("no user-info endpoints configured".to_string());

        for path in &self.config.user_info_paths {
            let attempt = self.transport
                .fetch_user_info(path)
                .await
                .and_then(|resp| resp.into_state());
            match attempt {
                Ok(state) => return Ok(state),
                Err(e) => {
                    tracing::warn!(endpoint = %path, error = %e, "user info endpoint failed");
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }

    async fn ensure_initialized(&self) {
        if !self.config.lazy_initialize || self.is_initialized() {
            return;
        }
        let _guard = self.init_lock.lock().await;
        if self.is_initialized() {
            return;
        }
        // without defaults a failed sync leaves us uninitialized; retry at
        // most once per min_refresh_interval
        if !self.config.default_on_failure
            && attempted_recently(*lock(&self.last_attempt), self.config.min_refresh_interval())
        {
            return;
        }
        // errors are already logged and traced by initialize()
        let _ = self.initialize().await;
    }

    /// Whether gating must refuse because no real balance was ever loaded.
    fn balance_unknown(&self) -> bool {
        !self.config.default_on_failure && !self.is_initialized()
    }

    // ── Gate and debit ───────────────────────────────────

    /// Cost of `task_type`; unknown task types cost 1.
    pub fn get_cost(&self, task_type: &str) -> u32 {
        self.costs.get_cost(task_type)
    }

    /// Check whether the current balance covers a task. Reads the mirrored
    /// state only; the server is contacted solely for a lazy first sync.
    pub async fn check_credits(&self, task_type: &str, custom_amount: Option<u32>) -> CheckResult {
        self.ensure_initialized().await;
        let cost = custom_amount.unwrap_or_else(|| self.get_cost(task_type));
        let state = self.read_state();

        let result = if self.balance_unknown() {
            CheckResult {
                task_type: task_type.to_string(),
                allowed:   false,
                cost,
                remaining: Remaining::Finite(0),
                plan:      state.plan.clone(),
                needed:    u64::from(cost),
                error:     Some(NOT_INITIALIZED.to_string()),
            }
        } else if state.bypasses_balance() {
            CheckResult {
                task_type: task_type.to_string(),
                allowed:   true,
                cost,
                remaining: Remaining::Unlimited,
                plan:      state.plan.clone(),
                needed:    0,
                error:     None,
            }
        } else {
            CheckResult {
                task_type: task_type.to_string(),
                allowed:   state.remaining.covers(cost),
                cost,
                remaining: state.remaining,
                plan:      state.plan.clone(),
                needed:    state.remaining.shortfall(cost),
                error:     None,
            }
        };

        tracing::debug!(
            task_type,
            cost,
            remaining = %result.remaining,
            allowed   = result.allowed,
            "credit check"
        );
        result
    }

    /// Gate paid work. Emits [`CreditEvent::InsufficientCredits`] and returns
    /// `false` when the balance does not cover the task. Never debits.
    pub async fn enforce_credits(&self, task_type: &str, custom_amount: Option<u32>) -> bool {
        self.gate(task_type, custom_amount).await.allowed
    }

    async fn gate(&self, task_type: &str, custom_amount: Option<u32>) -> CheckResult {
        let check = self.check_credits(task_type, custom_amount).await;
        if check.allowed {
            return check;
        }

        if let Some(error) = &check.error {
            tracing::warn!(task_type, error = %error, "credit gate closed");
            self.record("enforce", Some(task_type), format!("blocked: {}", error));
            return check;
        }

        tracing::warn!(
            task_type,
            cost      = check.cost,
            remaining = %check.remaining,
            needed    = check.needed,
            plan      = %check.plan,
            "insufficient credits"
        );
        self.record("enforce", Some(task_type), format!("blocked: needed={}", check.needed));
        self.events.emit(CreditEvent::InsufficientCredits(InsufficientCreditsNotice::from_check(&check)));
        check
    }

    /// Debit credits for a finished task.
    ///
    /// Fails fast without a network call when the balance does not cover the
    /// cost. On success the mirrored balance becomes exactly the server's
    /// `remaining_credits`, or stays unlimited for unlimited accounts.
    pub async fn consume_credits(&self, task_type: &str, custom_amount: Option<u32>) -> ConsumeResult {
        let check = self.check_credits(task_type, custom_amount).await;
        if !check.allowed {
            match &check.error {
                Some(error) => self.record("consume", Some(task_type), format!("rejected locally: {}", error)),
                None => self.record("consume", Some(task_type), format!("rejected locally: needed={}", check.needed)),
            }
            return ConsumeResult::insufficient(&check);
        }

        let _slot = if self.config.dedupe_in_flight {
            match InFlight::claim(&self.in_flight, task_type) {
                Some(slot) => Some(slot),
                None => {
                    tracing::debug!(task_type, "consume already in flight — rejecting duplicate");
                    self.record("consume", Some(task_type), "rejected: already in flight");
                    return ConsumeResult::failure(ALREADY_IN_FLIGHT);
                }
            }
        } else {
            None
        };

        let request = ConsumeRequest {
            task_type: task_type.to_string(),
            amount:    custom_amount,
        };

        let response = match self.transport.consume(&request).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!(task_type, error = %e, "credit debit failed");
                self.record("consume", Some(task_type), format!("failed: {}", e));
                return ConsumeResult::failure(e.to_string());
            }
        };

        if !response.success {
            let error = response.error.unwrap_or_else(|| "Credit consumption failed".to_string());
            tracing::error!(task_type, error = %error, "server refused credit debit");
            self.record("consume", Some(task_type), format!("refused: {}", error));
            return ConsumeResult::failure(error);
        }

        let consumed = response.credits_consumed.unwrap_or(check.cost);
        let remaining = {
            let mut state = self.write_state();
            if state.is_unlimited() {
                state.remaining = Remaining::Unlimited;
            } else {
                // the unlimited sentinel only counts when user-info says so
                let raw = match response.remaining_credits {
                    Some(raw) if raw >= 0 => raw,
                    other => {
                        drop(state);
                        let problem = match other {
                            Some(raw) => format!("negative remaining_credits {} for a metered account", raw),
                            None => "missing remaining_credits".to_string(),
                        };
                        tracing::error!(task_type, problem = %problem, "malformed debit response");
                        self.record("consume", Some(task_type), format!("failed: {}", problem));
                        return ConsumeResult::failure(TransportError::Malformed(problem).to_string());
                    }
                };
                state.remaining = Remaining::from_wire(raw);
                let total = state.total.to_wire();
                state.raw = Some(RawCredits { remaining: raw, total });
            }
            state.remaining
        };

        tracing::info!(task_type, consumed, remaining = %remaining, "credits consumed");
        self.record("consume", Some(task_type), format!("consumed={} remaining={}", consumed, remaining));
        self.events.emit(CreditEvent::Consumed {
            task_type: task_type.to_string(),
            consumed,
            status:    self.get_credit_status(),
        });

        ConsumeResult::success(consumed, remaining)
    }

    /// `enforce_credits` followed by `consume_credits`.
    pub async fn check_and_consume_credits(&self, task_type: &str, custom_amount: Option<u32>) -> ConsumeResult {
        let check = self.gate(task_type, custom_amount).await;
        if !check.allowed {
            return ConsumeResult::failure(check.error.unwrap_or_else(|| INSUFFICIENT_CREDITS.to_string()));
        }
        self.consume_credits(task_type, custom_amount).await
    }

    // ── Plan and status ──────────────────────────────────

    /// Switch the local plan, notify subscribers, then resync with the
    /// server. A failed resync is reported through
    /// [`CreditEvent::RefreshFailed`] and the returned status reflects the
    /// new plan with the previous balance.
    pub async fn update_plan(&self, plan: Plan) -> CreditStatus {
        {
            let mut state = self.write_state();
            tracing::info!(from = %state.plan, to = %plan, "plan updated");
            state.is_admin = plan == Plan::Admin;
            state.plan = plan.clone();
        }
        self.record("update_plan", None, format!("plan={}", plan));
        self.events.emit(CreditEvent::Updated(self.get_credit_status()));

        if let Err(e) = self.refresh_from_server().await {
            tracing::warn!(error = %e, "resync after plan update failed");
        }
        self.get_credit_status()
    }

    pub fn get_credit_status(&self) -> CreditStatus {
        let state = self.read_state();
        CreditStatus {
            remaining:    state.remaining,
            total:        state.total,
            plan:         state.plan.clone(),
            quota_period: state.quota_period,
            is_admin:     state.is_admin,
            unlimited:    state.bypasses_balance(),
            initialized:  self.is_initialized(),
            last_refresh: *lock(&self.last_refresh),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Receive every [`CreditEvent`] emitted from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CreditEvent> {
        self.events.subscribe()
    }

    pub fn trace(&self) -> Vec<TraceEntry> {
        lock(&self.trace).entries()
    }

    pub fn cost_table(&self) -> &CostTable {
        &self.costs
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ── Internals ────────────────────────────────────────

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, CreditState> {
        self.state.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, CreditState> {
        self.state.write().unwrap_or_else(|p| p.into_inner())
    }

    fn store(&self, state: CreditState) {
        *self.write_state() = state;
    }

    fn mark_refreshed(&self) {
        *lock(&self.last_refresh) = Some(Utc::now());
        *lock(&self.last_attempt) = Some(Instant::now());
    }

    fn record(&self, operation: &str, task_type: Option<&str>, detail: impl Into<String>) {
        lock(&self.trace).record(operation, task_type, detail);
    }
}

fn attempted_recently(last: Option<Instant>, min_interval: std::time::Duration) -> bool {
    last.is_some_and(|prev| Instant::now().duration_since(prev) < min_interval)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// Claim on a task type's in-flight slot, released on drop.
struct InFlight<'a> {
    slots:     &'a Mutex<HashSet<String>>,
    task_type: String,
}

impl<'a> InFlight<'a> {
    fn claim(slots: &'a Mutex<HashSet<String>>, task_type: &str) -> Option<Self> {
        if lock(slots).insert(task_type.to_string()) {
            Some(Self { slots, task_type: task_type.to_string() })
        } else {
            None
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(self.slots).remove(&self.task_type);
    }
}

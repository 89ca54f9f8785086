use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A credit balance that is either a finite count or unlimited.
///
/// The backend encodes "unlimited" as `-1`; inside the crate that sentinel
/// never appears in arithmetic, only at the wire boundary via
/// [`Remaining::from_wire`] and [`Remaining::to_wire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Remaining {
    Finite(u64),
    Unlimited,
}

impl Remaining {
    /// Decode a wire value. `-1` is the unlimited sentinel, other negative
    /// values clamp to zero.
    pub fn from_wire(value: i64) -> Self {
        if value == -1 {
            Remaining::Unlimited
        } else {
            Remaining::Finite(value.max(0) as u64)
        }
    }

    pub fn to_wire(self) -> i64 {
        match self {
            Remaining::Finite(n) => i64::try_from(n).unwrap_or(i64::MAX),
            Remaining::Unlimited => -1,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Remaining::Unlimited)
    }

    pub fn finite(&self) -> Option<u64> {
        match self {
            Remaining::Finite(n) => Some(*n),
            Remaining::Unlimited => None,
        }
    }

    /// Returns true if `cost` credits can be paid from this balance.
    pub fn covers(&self, cost: u32) -> bool {
        match self {
            Remaining::Finite(n) => *n >= u64::from(cost),
            Remaining::Unlimited => true,
        }
    }

    /// Credits missing to pay `cost`; zero when covered.
    pub fn shortfall(&self, cost: u32) -> u64 {
        match self {
            Remaining::Finite(n) => u64::from(cost).saturating_sub(*n),
            Remaining::Unlimited => 0,
        }
    }
}

impl std::fmt::Display for Remaining {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Remaining::Finite(n) => write!(f, "{}", n),
            Remaining::Unlimited => write!(f, "unlimited"),
        }
    }
}

impl Serialize for Remaining {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Remaining::Finite(n) => serializer.serialize_u64(*n),
            Remaining::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

impl<'de> Deserialize<'de> for Remaining {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(i64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(Remaining::from_wire(n)),
            Repr::Text(s) if s.eq_ignore_ascii_case("unlimited") => Ok(Remaining::Unlimited),
            Repr::Text(s) => s
                .parse::<i64>()
                .map(Remaining::from_wire)
                .map_err(|_| serde::de::Error::custom(format!("invalid credit balance: {}", s))),
        }
    }
}

/// Subscription tier as reported by `plan_name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Plan {
    #[default]
    Free,
    Plus,
    Pro,
    Admin,
    Other(String),
}

impl Plan {
    /// Parse from a plan name (case-insensitive). Unknown names are kept verbatim.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "" | "free" => Plan::Free,
            "plus"      => Plan::Plus,
            "pro"       => Plan::Pro,
            "admin"     => Plan::Admin,
            _           => Plan::Other(name.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Plan::Free     => "free",
            Plan::Plus     => "plus",
            Plan::Pro      => "pro",
            Plan::Admin    => "admin",
            Plan::Other(s) => s.as_str(),
        }
    }

    /// Plans that skip balance enforcement entirely.
    pub fn bypasses_balance(&self) -> bool {
        matches!(self, Plan::Pro | Plan::Admin)
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Plan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Plan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Plan::parse(&name))
    }
}

/// Reset cadence of the balance. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaPeriod {
    #[default]
    Daily,
    Monthly,
    Unlimited,
}

impl QuotaPeriod {
    /// Parse the backend's `credits.type` field. Unknown values read as daily.
    pub fn parse(kind: &str) -> Self {
        match kind.trim().to_lowercase().as_str() {
            "monthly"   => QuotaPeriod::Monthly,
            "unlimited" => QuotaPeriod::Unlimited,
            _           => QuotaPeriod::Daily,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaPeriod::Daily     => "daily",
            QuotaPeriod::Monthly   => "monthly",
            QuotaPeriod::Unlimited => "unlimited",
        }
    }
}

impl std::fmt::Display for QuotaPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The numbers exactly as the server sent them, sentinels included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCredits {
    pub remaining: i64,
    pub total:     i64,
}

/// In-memory mirror of the user's quota. The server is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditState {
    pub remaining:    Remaining,
    pub total:        Remaining,
    pub plan:         Plan,
    pub quota_period: QuotaPeriod,
    pub is_admin:     bool,
    /// Last values received from the server, if any
    pub raw:          Option<RawCredits>,
}

impl CreditState {
    /// The free-tier state used before the first sync and when sync fails.
    pub fn free_default(credits: u64) -> Self {
        Self {
            remaining:    Remaining::Finite(credits),
            total:        Remaining::Finite(credits),
            plan:         Plan::Free,
            quota_period: QuotaPeriod::Daily,
            is_admin:     false,
            raw:          None,
        }
    }

    /// True when no balance check applies: pro/admin plans, unlimited
    /// quota period, or an admin account.
    pub fn bypasses_balance(&self) -> bool {
        self.is_admin
            || self.plan.bypasses_balance()
            || self.quota_period == QuotaPeriod::Unlimited
    }

    /// True when the displayed balance must stay unlimited after a debit.
    pub fn is_unlimited(&self) -> bool {
        self.is_admin
            || self.plan == Plan::Admin
            || self.quota_period == QuotaPeriod::Unlimited
            || self.remaining.is_unlimited()
    }
}

impl Default for CreditState {
    fn default() -> Self {
        Self::free_default(crate::config::DEFAULT_CREDITS)
    }
}

/// Outcome of a pure balance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub task_type: String,
    pub allowed:   bool,
    pub cost:      u32,
    /// `Unlimited` whenever the balance does not apply
    pub remaining: Remaining,
    pub plan:      Plan,
    pub needed:    u64,
    /// Set when the check could not be made against a real balance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error:     Option<String>,
}

/// Outcome of a debit attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeResult {
    pub success:   bool,
    pub consumed:  Option<u32>,
    pub remaining: Option<Remaining>,
    pub error:     Option<String>,
}

impl ConsumeResult {
    pub fn success(consumed: u32, remaining: Remaining) -> Self {
        Self { success: true, consumed: Some(consumed), remaining: Some(remaining), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, consumed: None, remaining: None, error: Some(error.into()) }
    }

    /// Failure carrying the balance that was checked against.
    pub fn insufficient(check: &CheckResult) -> Self {
        Self {
            success:   false,
            consumed:  None,
            remaining: Some(check.remaining),
            error:     Some(check.error.clone().unwrap_or_else(|| INSUFFICIENT_CREDITS.to_string())),
        }
    }
}

pub const INSUFFICIENT_CREDITS: &str = "Insufficient credits";
pub const NOT_INITIALIZED: &str = "Credit ledger not initialized";

/// Snapshot returned by `CreditLedger::get_credit_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditStatus {
    pub remaining:    Remaining,
    pub total:        Remaining,
    pub plan:         Plan,
    pub quota_period: QuotaPeriod,
    pub is_admin:     bool,
    pub unlimited:    bool,
    pub initialized:  bool,
    pub last_refresh: Option<chrono::DateTime<chrono::Utc>>,
}

use serde::{Deserialize, Serialize};
use crate::error::TransportError;
use crate::types::{CreditState, Plan, QuotaPeriod, RawCredits, Remaining};

// ── User info ────────────────────────────────────────────

/// Body of `GET /api/user-info` (and the `/payment/user-info` fallback).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserInfoResponse {
    #[serde(default)]
    pub success:   bool,
    #[serde(default)]
    pub user_info: Option<UserInfo>,
    #[serde(default)]
    pub error:     Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    #[serde(default)]
    pub credits:   Option<WireCredits>,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub is_admin:  Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WireCredits {
    #[serde(default)]
    pub remaining: Option<i64>,
    #[serde(default)]
    pub total:     Option<i64>,
    #[serde(default, rename = "type")]
    pub kind:      Option<String>,
}

impl UserInfoResponse {
    /// A successful response carrying the given credit numbers.
    pub fn with_credits(remaining: i64, total: i64, kind: &str, plan_name: &str) -> Self {
        Self {
            success:   true,
            user_info: Some(UserInfo {
                credits:   Some(WireCredits {
                    remaining: Some(remaining),
                    total:     Some(total),
                    kind:      Some(kind.to_string()),
                }),
                plan_name: Some(plan_name.to_string()),
                is_admin:  None,
            }),
            error:     None,
        }
    }

    /// Convert into a [`CreditState`].
    ///
    /// Unlimited access is signalled by `total == -1`, `remaining == -1`,
    /// `type == "unlimited"` or `plan_name == "admin"`. Missing fields are
    /// treated as a malformed response.
    pub fn into_state(self) -> Result<CreditState, TransportError> {
        if !self.success {
            return Err(TransportError::Malformed(
                self.error.unwrap_or_else(|| "user-info reported success=false".to_string()),
            ));
        }
        let info = self.user_info
            .ok_or_else(|| TransportError::Malformed("missing user_info".to_string()))?;
        let credits = info.credits
            .ok_or_else(|| TransportError::Malformed("missing user_info.credits".to_string()))?;
        let raw_remaining = credits.remaining
            .ok_or_else(|| TransportError::Malformed("missing credits.remaining".to_string()))?;
        let raw_total = credits.total
            .ok_or_else(|| TransportError::Malformed("missing credits.total".to_string()))?;

        let plan = info.plan_name.as_deref().map(Plan::parse).unwrap_or_default();
        let kind = credits.kind.as_deref().map(QuotaPeriod::parse).unwrap_or_default();

        let unlimited = raw_total == -1
            || raw_remaining == -1
            || kind == QuotaPeriod::Unlimited
            || plan == Plan::Admin;
        let is_admin = plan == Plan::Admin || info.is_admin.unwrap_or(false);
        let raw = Some(RawCredits { remaining: raw_remaining, total: raw_total });

        if unlimited {
            return Ok(CreditState {
                remaining:    Remaining::Unlimited,
                total:        Remaining::Unlimited,
                plan,
                quota_period: QuotaPeriod::Unlimited,
                is_admin,
                raw,
            });
        }

        Ok(CreditState {
            remaining:    Remaining::from_wire(raw_remaining),
            total:        Remaining::from_wire(raw_total),
            plan,
            quota_period: kind,
            is_admin,
            raw,
        })
    }
}

// ── Consume ──────────────────────────────────────────────

/// Body of `POST /api/consume-credits`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsumeRequest {
    pub task_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount:    Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsumeResponse {
    #[serde(default)]
    pub success:           bool,
    #[serde(default)]
    pub credits_consumed:  Option<u32>,
    #[serde(default)]
    pub remaining_credits: Option<i64>,
    #[serde(default)]
    pub error:             Option<String>,
}

impl ConsumeResponse {
    pub fn ok(consumed: u32, remaining: i64) -> Self {
        Self {
            success:           true,
            credits_consumed:  Some(consumed),
            remaining_credits: Some(remaining),
            error:             None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()), ..Default::default() }
    }
}

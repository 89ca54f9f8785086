//! UI-free display models for credit widgets and insufficient-credit prompts.
//!
//! These carry everything a front end needs to render a balance badge or an
//! upgrade dialog; the rendering itself lives with the caller.

use serde::{Deserialize, Serialize};
use crate::types::{CheckResult, CreditStatus, Plan, QuotaPeriod, Remaining};

/// Remaining fraction at or below which the balance is shown as low.
pub const LOW_THRESHOLD: f64 = 0.25;
/// Remaining fraction at or below which the balance is shown as critical.
pub const CRITICAL_THRESHOLD: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayLevel {
    Healthy,
    Low,
    Critical,
    Unlimited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditDisplay {
    /// Badge text, e.g. `"45 / 50"` or `"Unlimited"`
    pub text:              String,
    /// `"today"`, `"this month"` or empty for unlimited plans
    pub period_label:      String,
    pub plan_label:        String,
    pub level:             DisplayLevel,
    /// 0.0 – 100.0, `None` when unlimited or the total is zero
    pub percent_remaining: Option<f64>,
}

impl CreditDisplay {
    pub fn from_status(status: &CreditStatus) -> Self {
        let plan_label = plan_label(&status.plan);

        if status.unlimited {
            return Self {
                text:              "Unlimited".to_string(),
                period_label:      String::new(),
                plan_label,
                level:             DisplayLevel::Unlimited,
                percent_remaining: None,
            };
        }

        let percent_remaining = match (status.remaining, status.total) {
            (Remaining::Finite(r), Remaining::Finite(t)) if t > 0 => {
                Some((r.min(t) as f64 / t as f64) * 100.0)
            }
            _ => None,
        };

        let level = match percent_remaining {
            Some(p) if p <= CRITICAL_THRESHOLD * 100.0 => DisplayLevel::Critical,
            Some(p) if p <= LOW_THRESHOLD * 100.0      => DisplayLevel::Low,
            Some(_)                                   => DisplayLevel::Healthy,
            None if status.remaining == Remaining::Finite(0) => DisplayLevel::Critical,
            None                                      => DisplayLevel::Healthy,
        };

        let period_label = match status.quota_period {
            QuotaPeriod::Daily     => "today",
            QuotaPeriod::Monthly   => "this month",
            QuotaPeriod::Unlimited => "",
        }.to_string();

        Self {
            text: format!("{} / {}", status.remaining, status.total),
            period_label,
            plan_label,
            level,
            percent_remaining,
        }
    }
}

fn plan_label(plan: &Plan) -> String {
    match plan {
        Plan::Free     => "Free".to_string(),
        Plan::Plus     => "Plus".to_string(),
        Plan::Pro      => "Pro".to_string(),
        Plan::Admin    => "Admin".to_string(),
        Plan::Other(s) => s.clone(),
    }
}

/// Structured payload for an "insufficient credits" prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsufficientCreditsNotice {
    pub task_type:      String,
    pub cost:           u32,
    pub remaining:      Remaining,
    pub needed:         u64,
    pub plan:           Plan,
    /// Next tier worth offering, if any
    pub suggested_plan: Option<Plan>,
    pub message:        String,
}

impl InsufficientCreditsNotice {
    pub fn from_check(check: &CheckResult) -> Self {
        let suggested_plan = match check.plan {
            Plan::Free | Plan::Other(_) => Some(Plan::Plus),
            Plan::Plus                  => Some(Plan::Pro),
            Plan::Pro | Plan::Admin     => None,
        };

        let mut message = format!(
            "This task needs {} credit{} but you have {} left ({} more needed).",
            check.cost,
            if check.cost == 1 { "" } else { "s" },
            check.remaining,
            check.needed,
        );
        if let Some(plan) = &suggested_plan {
            message.push_str(&format!(" Upgrade to {} for more credits.", plan_label(plan)));
        }

        Self {
            task_type: check.task_type.clone(),
            cost:      check.cost,
            remaining: check.remaining,
            needed:    check.needed,
            plan:      check.plan.clone(),
            suggested_plan,
            message,
        }
    }
}

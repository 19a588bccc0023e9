use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Pro,
    Enterprise,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Enterprise => "enterprise",
        }
    }

    pub fn parse(s: &str) -> Option<Plan> {
        match s {
            "free" => Some(Plan::Free),
            "pro" => Some(Plan::Pro),
            "enterprise" => Some(Plan::Enterprise),
            _ => None,
        }
    }

    /// Maximum simultaneously open job postings; `None` is unlimited.
    pub fn open_job_quota(&self) -> Option<i64> {
        match self {
            Plan::Free => Some(3),
            Plan::Pro => Some(25),
            Plan::Enterprise => None,
        }
    }

    pub fn features(&self) -> &'static [&'static str] {
        match self {
            Plan::Free => &["profile", "job_board", "forum", "resource_hub"],
            Plan::Pro => &["profile", "job_board", "forum", "resource_hub", "matching", "featured_listing"],
            Plan::Enterprise => &[
                "profile", "job_board", "forum", "resource_hub", "matching",
                "featured_listing", "team_seats", "priority_support",
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Subscription {
    pub user_id: String,
    pub plan: String,
    pub status: String,
    pub current_period_end: Option<String>,
    pub updated_at: String,
}

impl Subscription {
    pub const COLUMNS: &'static str = "user_id, plan, status, current_period_end, updated_at";

    /// Unknown plans fall back to the free tier.
    pub fn plan(&self) -> Plan {
        Plan::parse(&self.plan).unwrap_or(Plan::Free)
    }

    /// Paid features are available while trialing or active and the period has not lapsed.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        let status_ok = matches!(self.status.as_str(), "active" | "trialing");
        let period_ok = match self.current_period_end.as_deref() {
            None => true,
            Some(end) => DateTime::parse_from_rfc3339(end)
                .map(|end| end.with_timezone(&Utc) > now)
                .unwrap_or(false),
        };
        status_ok && period_ok
    }

    /// Plan whose limits apply right now: a lapsed subscription drops to free.
    pub fn effective_plan(&self, now: DateTime<Utc>) -> Plan {
        if self.is_active_at(now) { self.plan() } else { Plan::Free }
    }

    pub fn to_json(&self, now: DateTime<Utc>) -> Value {
        let effective = self.effective_plan(now);
        json!({
            "plan": self.plan,
            "status": self.status,
            "current_period_end": self.current_period_end,
            "is_active": self.is_active_at(now),
            "effective_plan": effective.as_str(),
            "features": effective.features(),
            "open_job_quota": effective.open_job_quota(),
            "updated_at": self.updated_at,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubscriptionRequest {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<String>,
}

// SPDX-License-Identifier: MIT

//! Client-held access token: a short-lived cache of the entitlement,
//! issued by the session verifier right after a successful checkout.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Grace buffer added to the subscription period end so renewal webhook
/// latency does not lock a paying member out (7 days).
pub const RENEWAL_GRACE_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Fallback membership expiry when no subscription data is available
/// (35 days).
pub const MEMBERSHIP_FALLBACK_MS: i64 = 35 * 24 * 60 * 60 * 1000;

/// Course purchases are lifetime; the token gets a far-future expiry
/// (100 years).
pub const COURSE_LIFETIME_MS: i64 = 100 * 365 * 24 * 60 * 60 * 1000;

/// Purchase plan, as carried in checkout session metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Plan {
    Course,
    Membership,
}

/// Error for a plan name that is neither "course" nor "membership".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownPlan;

impl std::str::FromStr for Plan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "course" => Ok(Plan::Course),
            "membership" => Ok(Plan::Membership),
            _ => Err(UnknownPlan),
        }
    }
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Course => "course",
            Plan::Membership => "membership",
        }
    }
}

/// Access token handed to the browser and kept in its local cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AccessToken {
    pub course_access: bool,
    pub member_access: bool,
    /// Expiry in epoch millis. `None` means no expiry was derived; such a
    /// token never expires on its own (it also grants nothing unless a
    /// flag is set).
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub expires_at: Option<i64>,
    /// Stripe customer id, carried for portal-session creation
    pub customer_id: Option<String>,
    /// Customer email, carried for account linking
    pub customer_email: Option<String>,
    pub plan: Option<Plan>,
}

impl AccessToken {
    /// Whether the token has expired at `now_ms` (epoch millis).
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now_ms > expires_at,
            None => false,
        }
    }

    /// Whether the token grants any access at all.
    pub fn grants_access(&self) -> bool {
        self.course_access || self.member_access
    }
}

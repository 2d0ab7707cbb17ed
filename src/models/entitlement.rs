// SPDX-License-Identifier: MIT

//! Entitlement record: one row per customer identity.
//!
//! A record is created at first purchase, keyed by lowercased email, and
//! later linked to an account id when the customer registers. Lookups may
//! resolve through any of the three identity keys (account id, Stripe
//! customer id, email) in that order.

use serde::{Deserialize, Serialize};

/// Membership subscription status as tracked by the webhook reconciler.
///
/// Unknown Stripe statuses are carried through verbatim so a later event
/// can still resolve them; they never grant member access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MembershipStatus {
    None,
    Active,
    PastDue,
    Canceled,
    Other(String),
}

impl MembershipStatus {
    pub fn as_str(&self) -> &str {
        match self {
            MembershipStatus::None => "none",
            MembershipStatus::Active => "active",
            MembershipStatus::PastDue => "past_due",
            MembershipStatus::Canceled => "canceled",
            MembershipStatus::Other(s) => s,
        }
    }
}

impl From<String> for MembershipStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "none" | "" => MembershipStatus::None,
            "active" => MembershipStatus::Active,
            "past_due" => MembershipStatus::PastDue,
            "canceled" => MembershipStatus::Canceled,
            _ => MembershipStatus::Other(s),
        }
    }
}

impl From<MembershipStatus> for String {
    fn from(s: MembershipStatus) -> Self {
        s.as_str().to_string()
    }
}

impl std::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entitlement record stored in Firestore (document id: encoded email).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entitlement {
    /// Lowercased email, the original identity key
    pub email: String,
    /// Account id, linked after registration
    pub account_id: Option<String>,
    /// Stripe customer id, set on first purchase
    pub stripe_customer_id: Option<String>,
    /// One-time course purchase. Monotonic: once true, never auto-revoked.
    pub course_access: bool,
    /// Live membership access; tracks the subscription and may regress.
    pub member_access: bool,
    pub membership_status: MembershipStatus,
    /// When the course was first purchased (RFC3339)
    pub course_purchased_at: Option<String>,
    /// Last write timestamp (RFC3339)
    pub updated_at: String,
}

impl Entitlement {
    /// A fresh record for an email with no access.
    pub fn new(email: &str, updated_at: String) -> Self {
        Self {
            email: email.to_lowercase(),
            account_id: None,
            stripe_customer_id: None,
            course_access: false,
            member_access: false,
            membership_status: MembershipStatus::None,
            course_purchased_at: None,
            updated_at,
        }
    }

    /// Coarse access check: any purchased access counts, including a
    /// `past_due` membership still in its grace period.
    pub fn has_valid_access(&self) -> bool {
        self.course_access || self.member_access
    }

    /// Strict member-only check: requires an `active` subscription.
    pub fn has_member_access(&self) -> bool {
        self.member_access && self.membership_status == MembershipStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in ["none", "active", "past_due", "canceled", "incomplete"] {
            let status = MembershipStatus::from(s.to_string());
            assert_eq!(status.as_str(), s);
        }
    }

    #[test]
    fn test_coarse_vs_strict_access() {
        let mut e = Entitlement::new("USER@example.com", "2026-01-01T00:00:00Z".to_string());
        assert_eq!(e.email, "user@example.com");
        assert!(!e.has_valid_access());

        e.course_access = true;
        assert!(e.has_valid_access());
        assert!(!e.has_member_access());

        e.member_access = true;
        e.membership_status = MembershipStatus::PastDue;
        // Grace period: coarse check passes, strict member check does not.
        assert!(e.has_valid_access());
        assert!(!e.has_member_access());

        e.membership_status = MembershipStatus::Active;
        assert!(e.has_member_access());
    }
}

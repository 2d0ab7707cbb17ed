// SPDX-License-Identifier: MIT

//! Webhook reconciler: Stripe events → entitlement mutations.
//!
//! Split in two halves so the transition rules stay a pure function:
//! [`plan_change`] maps a verified event to an [`EntitlementChange`], and
//! [`apply_change`] applies it to the store. Every mutation is an
//! absolute assignment for the fields it owns, so replays and reordered
//! deliveries cannot corrupt state; the store write is an upsert keyed by
//! the event's own lookup key (email or customer id).

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Entitlement, MembershipStatus};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A verified webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// Access granted by a completed checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutGrant {
    pub course: bool,
    pub membership: bool,
}

/// The target mutation computed from one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitlementChange {
    /// Upsert by email: merge the grant into the record, creating it if
    /// absent. Never clears an existing access flag.
    GrantByEmail {
        email: String,
        customer_id: Option<String>,
        grant: CheckoutGrant,
    },
    /// Absolute assignment of membership fields, resolved by customer id.
    SetMembershipByCustomer {
        customer_id: String,
        member_access: bool,
        status: MembershipStatus,
    },
    /// Mark the membership past due without touching access. Only a
    /// subscription-deleted event revokes.
    FlagPastDueByCustomer { customer_id: String },
    /// Unrecognized or incomplete event: no-op, not an error.
    Ignore,
}

/// Map a Stripe subscription status onto our membership fields.
///
/// `past_due` keeps access (grace period); unknown statuses pass through
/// verbatim and grant nothing.
pub fn map_subscription_status(status: &str) -> (MembershipStatus, bool) {
    match status {
        "active" | "trialing" => (MembershipStatus::Active, true),
        "past_due" => (MembershipStatus::PastDue, true),
        "canceled" | "unpaid" => (MembershipStatus::Canceled, false),
        other => (MembershipStatus::Other(other.to_string()), false),
    }
}

/// Compute the target mutation for one event. Pure.
pub fn plan_change(event: &StripeEvent) -> EntitlementChange {
    let object = &event.data.object;

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let email = object
                .get("customer_email")
                .and_then(|v| v.as_str())
                .or_else(|| {
                    object
                        .get("customer_details")
                        .and_then(|d| d.get("email"))
                        .and_then(|v| v.as_str())
                });

            let Some(email) = email else {
                tracing::error!("No email found in checkout session");
                return EntitlementChange::Ignore;
            };

            let mode = object.get("mode").and_then(|v| v.as_str()).unwrap_or("");
            let customer_id = object
                .get("customer")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());

            EntitlementChange::GrantByEmail {
                email: email.to_lowercase(),
                customer_id,
                grant: CheckoutGrant {
                    course: mode == "payment",
                    membership: mode == "subscription",
                },
            }
        }

        "customer.subscription.updated" => {
            let Some(customer_id) = object.get("customer").and_then(|v| v.as_str()) else {
                return EntitlementChange::Ignore;
            };
            let status = object.get("status").and_then(|v| v.as_str()).unwrap_or("");
            let (status, member_access) = map_subscription_status(status);

            EntitlementChange::SetMembershipByCustomer {
                customer_id: customer_id.to_string(),
                member_access,
                status,
            }
        }

        "customer.subscription.deleted" => {
            let Some(customer_id) = object.get("customer").and_then(|v| v.as_str()) else {
                return EntitlementChange::Ignore;
            };

            EntitlementChange::SetMembershipByCustomer {
                customer_id: customer_id.to_string(),
                member_access: false,
                status: MembershipStatus::Canceled,
            }
        }

        "invoice.payment_failed" => {
            let Some(customer_id) = object.get("customer").and_then(|v| v.as_str()) else {
                return EntitlementChange::Ignore;
            };
            // Only subscription invoices affect membership state.
            let tied_to_subscription = object
                .get("subscription")
                .is_some_and(|v| !v.is_null());
            if !tied_to_subscription {
                return EntitlementChange::Ignore;
            }

            EntitlementChange::FlagPastDueByCustomer {
                customer_id: customer_id.to_string(),
            }
        }

        other => {
            tracing::debug!(event_type = other, "Ignoring unhandled event type");
            EntitlementChange::Ignore
        }
    }
}

/// Merge a checkout grant into an existing record (or a fresh one). Pure.
///
/// `course_access` is append-only: an absent flag in the grant never
/// clears one already set. Replaying the same grant is a no-op beyond
/// the `updated_at` stamp.
pub fn apply_grant(
    existing: Option<Entitlement>,
    email: &str,
    customer_id: Option<&str>,
    grant: CheckoutGrant,
    now: DateTime<Utc>,
) -> Entitlement {
    let now_str = format_utc_rfc3339(now);
    let mut entitlement =
        existing.unwrap_or_else(|| Entitlement::new(email, now_str.clone()));

    if let Some(customer_id) = customer_id {
        entitlement.stripe_customer_id = Some(customer_id.to_string());
    }

    if grant.course {
        entitlement.course_access = true;
        if entitlement.course_purchased_at.is_none() {
            entitlement.course_purchased_at = Some(now_str.clone());
        }
    }

    if grant.membership {
        entitlement.member_access = true;
        entitlement.membership_status = MembershipStatus::Active;
    }

    entitlement.updated_at = now_str;
    entitlement
}

/// Apply a computed change to the entitlement store.
///
/// Each call is a standalone transaction scoped by its own lookup key;
/// store failures surface so the provider retries the whole event.
pub async fn apply_change(
    db: &FirestoreDb,
    change: EntitlementChange,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    match change {
        EntitlementChange::GrantByEmail {
            email,
            customer_id,
            grant,
        } => {
            let existing = db.get_entitlement_by_email(&email).await?;
            let entitlement = apply_grant(existing, &email, customer_id.as_deref(), grant, now);
            db.set_entitlement(&entitlement).await?;
            tracing::info!(
                course = grant.course,
                membership = grant.membership,
                "Entitlement created/updated from checkout"
            );
        }

        EntitlementChange::SetMembershipByCustomer {
            customer_id,
            member_access,
            status,
        } => {
            let Some(mut entitlement) = db.get_entitlement_by_customer(&customer_id).await? else {
                tracing::warn!(customer_id, "No entitlement for subscription event");
                return Ok(());
            };
            entitlement.member_access = member_access;
            entitlement.membership_status = status.clone();
            entitlement.updated_at = format_utc_rfc3339(now);
            db.set_entitlement(&entitlement).await?;
            tracing::info!(customer_id, status = %status, member_access, "Membership status updated");
        }

        EntitlementChange::FlagPastDueByCustomer { customer_id } => {
            let Some(mut entitlement) = db.get_entitlement_by_customer(&customer_id).await? else {
                tracing::warn!(customer_id, "No entitlement for failed invoice");
                return Ok(());
            };
            entitlement.membership_status = MembershipStatus::PastDue;
            entitlement.updated_at = format_utc_rfc3339(now);
            db.set_entitlement(&entitlement).await?;
            tracing::info!(customer_id, "Membership flagged past_due");
        }

        EntitlementChange::Ignore => {}
    }

    Ok(())
}

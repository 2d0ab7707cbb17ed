// SPDX-License-Identifier: MIT

//! Session verifier: completed-checkout session id → access token.
//!
//! Read-only against Stripe; produces a token for the caller to persist.
//! A session in any non-paid state yields an error, never a token.

use crate::error::AppError;
use crate::models::token::{COURSE_LIFETIME_MS, MEMBERSHIP_FALLBACK_MS, RENEWAL_GRACE_MS};
use crate::models::{AccessToken, Plan};
use crate::services::stripe::{CheckoutSession, StripeClient, SubscriptionRef};
use chrono::{DateTime, Utc};

/// Refuse any session that is not fully paid. Unpaid, pending, and
/// absent payment states all map to [`AppError::NotPaid`].
pub fn ensure_paid(session: &CheckoutSession) -> Result<(), AppError> {
    if session.payment_status.as_deref() == Some("paid") {
        return Ok(());
    }
    tracing::warn!(
        session_id = %session.id,
        payment_status = ?session.payment_status,
        "Session not paid, refusing token"
    );
    Err(AppError::NotPaid)
}

/// Determine the purchased plan: session metadata wins, checkout mode is
/// the fallback for sessions created without metadata.
pub fn resolve_plan(metadata_plan: Option<&str>, mode: &str) -> Option<Plan> {
    if let Some(plan) = metadata_plan.and_then(|s| s.parse().ok()) {
        return Some(plan);
    }
    match mode {
        "subscription" => Some(Plan::Membership),
        "payment" => Some(Plan::Course),
        _ => None,
    }
}

/// Membership token expiry: subscription period end plus a 7-day grace
/// buffer for renewal webhook latency, or 35 days when no subscription
/// data is available.
pub fn membership_expiry(period_end_secs: Option<i64>, now_ms: i64) -> i64 {
    match period_end_secs {
        Some(period_end) => period_end * 1000 + RENEWAL_GRACE_MS,
        None => now_ms + MEMBERSHIP_FALLBACK_MS,
    }
}

/// Course token expiry: effectively non-expiring (lifetime purchase).
pub fn course_expiry(now_ms: i64) -> i64 {
    now_ms + COURSE_LIFETIME_MS
}

/// Verify a checkout session and derive the access token.
pub async fn verify_checkout_session(
    stripe: &StripeClient,
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<AccessToken, AppError> {
    let session = stripe.get_checkout_session(session_id).await?;
    ensure_paid(&session)?;

    let plan = resolve_plan(session.metadata_plan(), &session.mode);
    let now_ms = now.timestamp_millis();

    let (course_access, member_access, expires_at) = match plan {
        Some(Plan::Membership) => {
            // Full access while the subscription is active; expiry tracks
            // the billing period.
            let period_end = match &session.subscription {
                Some(SubscriptionRef::Object(sub)) => Some(sub.current_period_end),
                Some(SubscriptionRef::Id(id)) => {
                    Some(stripe.get_subscription(id).await?.current_period_end)
                }
                None => None,
            };
            (true, true, Some(membership_expiry(period_end, now_ms)))
        }
        Some(Plan::Course) => (true, false, Some(course_expiry(now_ms))),
        // Unknown plan: no access, nothing to expire. Mirrors the
        // provider contract of not failing a paid session outright.
        None => (false, false, None),
    };

    Ok(AccessToken {
        course_access,
        member_access,
        expires_at,
        customer_id: session.customer.clone(),
        customer_email: session.email().map(|s| s.to_string()),
        plan,
    })
}

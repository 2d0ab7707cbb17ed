// SPDX-License-Identifier: MIT

//! Integration tests against the Firestore emulator.
//!
//! Run with FIRESTORE_EMULATOR_HOST set; skipped otherwise.

mod common;

use chrono::{DateTime, Utc};
use tms_portal::db::LocalStore;
use tms_portal::models::{Entitlement, MembershipStatus, ProgressRecord};
use tms_portal::services::progress::{merge_local_progress, MergeOutcome};
use tms_portal::services::reconciler::{apply_change, plan_change, StripeEvent};

fn now() -> DateTime<Utc> {
    Utc::now()
}

fn event(event_type: &str, object: serde_json::Value) -> StripeEvent {
    serde_json::from_value(serde_json::json!({
        "id": "evt_test",
        "type": event_type,
        "data": {"object": object}
    }))
    .unwrap()
}

#[tokio::test]
async fn test_entitlement_upsert_and_lookup() {
    require_emulator!();
    let db = common::test_db().await;

    let email = format!("upsert-{}@example.com", Utc::now().timestamp_nanos_opt().unwrap());
    let mut entitlement = Entitlement::new(&email, "2026-01-01T00:00:00Z".to_string());
    entitlement.course_access = true;
    entitlement.stripe_customer_id = Some(format!("cus_{}", email.len()));

    db.set_entitlement(&entitlement).await.unwrap();

    let by_email = db.get_entitlement_by_email(&email).await.unwrap().unwrap();
    assert!(by_email.course_access);

    // Lookup is case-insensitive on email.
    let upper = db
        .get_entitlement_by_email(&email.to_uppercase())
        .await
        .unwrap();
    assert!(upper.is_some());
}

#[tokio::test]
async fn test_checkout_then_subscription_lifecycle() {
    require_emulator!();
    let db = common::test_db().await;

    let nanos = Utc::now().timestamp_nanos_opt().unwrap();
    let email = format!("lifecycle-{}@example.com", nanos);
    let customer_id = format!("cus_lifecycle_{}", nanos);

    // Membership checkout creates the record.
    let checkout = event(
        "checkout.session.completed",
        serde_json::json!({
            "customer_email": email,
            "customer": customer_id,
            "mode": "subscription"
        }),
    );
    apply_change(&db, plan_change(&checkout), now()).await.unwrap();

    let e = db.get_entitlement_by_email(&email).await.unwrap().unwrap();
    assert!(e.member_access);
    assert_eq!(e.membership_status, MembershipStatus::Active);

    // Failed invoice flags past_due but keeps access.
    let failed = event(
        "invoice.payment_failed",
        serde_json::json!({"customer": customer_id, "subscription": "sub_1"}),
    );
    apply_change(&db, plan_change(&failed), now()).await.unwrap();

    let e = db.get_entitlement_by_customer(&customer_id).await.unwrap().unwrap();
    assert!(e.member_access);
    assert_eq!(e.membership_status, MembershipStatus::PastDue);

    // Deletion revokes.
    let deleted = event(
        "customer.subscription.deleted",
        serde_json::json!({"customer": customer_id}),
    );
    apply_change(&db, plan_change(&deleted), now()).await.unwrap();

    let e = db.get_entitlement_by_customer(&customer_id).await.unwrap().unwrap();
    assert!(!e.member_access);
    assert_eq!(e.membership_status, MembershipStatus::Canceled);
}

#[tokio::test]
async fn test_checkout_replay_is_idempotent() {
    require_emulator!();
    let db = common::test_db().await;

    let nanos = Utc::now().timestamp_nanos_opt().unwrap();
    let email = format!("replay-{}@example.com", nanos);

    let checkout = event(
        "checkout.session.completed",
        serde_json::json!({
            "customer_email": email,
            "customer": format!("cus_replay_{}", nanos),
            "mode": "payment"
        }),
    );

    apply_change(&db, plan_change(&checkout), now()).await.unwrap();
    let first = db.get_entitlement_by_email(&email).await.unwrap().unwrap();

    apply_change(&db, plan_change(&checkout), now()).await.unwrap();
    let second = db.get_entitlement_by_email(&email).await.unwrap().unwrap();

    assert!(second.course_access);
    assert_eq!(second.course_purchased_at, first.course_purchased_at);
}

#[tokio::test]
async fn test_link_entitlement_to_account_once() {
    require_emulator!();
    let db = common::test_db().await;

    let nanos = Utc::now().timestamp_nanos_opt().unwrap();
    let email = format!("link-{}@example.com", nanos);

    let mut entitlement = Entitlement::new(&email, "2026-01-01T00:00:00Z".to_string());
    entitlement.course_access = true;
    db.set_entitlement(&entitlement).await.unwrap();

    let linked = db
        .link_entitlement_account(&email, "acct-link-1", "2026-01-02T00:00:00Z".to_string())
        .await
        .unwrap();
    assert!(linked);

    // A second attempt (even by another account) is a no-op.
    let relinked = db
        .link_entitlement_account(&email, "acct-link-2", "2026-01-03T00:00:00Z".to_string())
        .await
        .unwrap();
    assert!(!relinked);

    let e = db.get_entitlement_by_account("acct-link-1").await.unwrap().unwrap();
    assert_eq!(e.account_id.as_deref(), Some("acct-link-1"));
}

#[tokio::test]
async fn test_progress_merge_clears_cache_and_is_idempotent() {
    require_emulator!();
    let db = common::test_db().await;

    let account_id = format!(
        "acct-merge-{}",
        Utc::now().timestamp_nanos_opt().unwrap()
    );

    let store = LocalStore::new();
    store.set_legacy_completed_lessons(&["1-1".to_string(), "2-3".to_string()]);

    let outcome = merge_local_progress(&db, &store, &account_id, now()).await;
    assert!(matches!(outcome, MergeOutcome::Merged { lessons: 2 }));
    assert!(!store.has_local_progress());

    let records = db.get_progress_for_account(&account_id).await.unwrap();
    assert_eq!(records.len(), 2);

    // Replaying with the same lessons re-staged does not duplicate.
    store.set_legacy_completed_lessons(&["1-1".to_string(), "2-3".to_string()]);
    let outcome = merge_local_progress(&db, &store, &account_id, now()).await;
    assert!(matches!(outcome, MergeOutcome::Merged { lessons: 2 }));

    let records = db.get_progress_for_account(&account_id).await.unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn test_progress_set_and_delete() {
    require_emulator!();
    let db = common::test_db().await;

    let account_id = format!(
        "acct-prog-{}",
        Utc::now().timestamp_nanos_opt().unwrap()
    );

    let record = ProgressRecord {
        account_id: account_id.clone(),
        lesson_id: "week 1/intro".to_string(),
        completed: true,
        completed_at: "2026-01-01T00:00:00.000Z".to_string(),
    };
    db.set_progress(&record).await.unwrap();

    let records = db.get_progress_for_account(&account_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].lesson_id, "week 1/intro");

    db.delete_progress(&account_id, "week 1/intro").await.unwrap();
    let records = db.get_progress_for_account(&account_id).await.unwrap();
    assert!(records.is_empty());
}

// SPDX-License-Identifier: MIT

//! Access resolver: "does this user currently have course / member
//! access?"
//!
//! Resolution order, first match wins:
//! 1. authenticated account → entitlement record (fetched once per
//!    session context, shared across concurrent callers)
//! 2. non-expired local access token → embedded flags, no network call
//! 3. legacy local flag → valid access, unspecified tier
//! 4. no access

use crate::db::{FirestoreDb, LocalStore};
use crate::error::AppError;
use crate::models::Entitlement;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The authenticated account attached to a session, if any.
#[derive(Debug, Clone)]
pub struct AccountSession {
    pub account_id: String,
    pub email: Option<String>,
}

/// Where the access decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSource {
    Account,
    Token,
    Legacy,
    None,
}

/// Resolved access for a session.
#[derive(Debug, Clone, Copy)]
pub struct AccessDecision {
    /// Coarse check: any purchased access, including `past_due` members.
    pub has_access: bool,
    pub course_access: bool,
    /// Strict member check. From an entitlement this requires an
    /// `active` status; from a local token it is the embedded flag.
    pub member_access: bool,
    pub source: AccessSource,
}

impl AccessDecision {
    fn none() -> Self {
        Self {
            has_access: false,
            course_access: false,
            member_access: false,
            source: AccessSource::None,
        }
    }
}

/// Decision derived from an entitlement record.
pub fn account_decision(entitlement: Option<&Entitlement>) -> AccessDecision {
    match entitlement {
        Some(e) => AccessDecision {
            has_access: e.has_valid_access(),
            course_access: e.course_access,
            member_access: e.has_member_access(),
            source: AccessSource::Account,
        },
        None => AccessDecision {
            has_access: false,
            course_access: false,
            member_access: false,
            source: AccessSource::Account,
        },
    }
}

/// Session-scoped resolver state.
///
/// Holds the account (if authenticated) and a cached entitlement lookup.
/// The cache lives behind one async mutex, so concurrent resolves from
/// multiple entry points share a single in-flight fetch instead of
/// issuing duplicates: the first caller fetches while holding the lock,
/// later callers find the cache populated.
#[derive(Clone)]
pub struct SessionContext {
    account: Option<AccountSession>,
    /// `None` = not fetched yet; `Some(None)` = fetched, no record.
    cached_entitlement: Arc<Mutex<Option<Option<Entitlement>>>>,
}

impl SessionContext {
    pub fn new(account: Option<AccountSession>) -> Self {
        Self {
            account,
            cached_entitlement: Arc::new(Mutex::new(None)),
        }
    }

    pub fn account(&self) -> Option<&AccountSession> {
        self.account.as_ref()
    }

    /// The account's entitlement record, fetched at most once per context.
    pub async fn entitlement(&self, db: &FirestoreDb) -> Result<Option<Entitlement>, AppError> {
        let Some(account) = &self.account else {
            return Ok(None);
        };

        let mut cached = self.cached_entitlement.lock().await;
        if let Some(entitlement) = cached.as_ref() {
            return Ok(entitlement.clone());
        }

        let fetched = db
            .resolve_entitlement(Some(&account.account_id), None, account.email.as_deref())
            .await?;
        *cached = Some(fetched.clone());
        Ok(fetched)
    }

    /// Resolve current effective access.
    pub async fn resolve(
        &self,
        db: &FirestoreDb,
        store: &LocalStore,
        now_ms: i64,
    ) -> Result<AccessDecision, AppError> {
        // 1. Authenticated account: the entitlement record decides,
        //    even when no record exists.
        if self.account.is_some() {
            let entitlement = self.entitlement(db).await?;
            return Ok(account_decision(entitlement.as_ref()));
        }

        // 2. Local token: embedded flags, no network call. Expired
        //    tokens are lazily deleted by the store.
        if let Some(token) = store.access_token(now_ms) {
            return Ok(AccessDecision {
                has_access: token.grants_access(),
                course_access: token.course_access,
                member_access: token.member_access,
                source: AccessSource::Token,
            });
        }

        // 3. Legacy flag: valid access, tier unspecified.
        if store.legacy_access_granted() {
            return Ok(AccessDecision {
                has_access: true,
                course_access: false,
                member_access: false,
                source: AccessSource::Legacy,
            });
        }

        Ok(AccessDecision::none())
    }

    /// Drop the cached entitlement (explicit re-fetch).
    pub async fn invalidate(&self) {
        *self.cached_entitlement.lock().await = None;
    }

    /// Sign out: drop cached state and clear local access keys.
    pub async fn sign_out(&self, store: &LocalStore) {
        self.invalidate().await;
        store.clear_access();
    }

    /// Seed the entitlement cache without a fetch.
    #[cfg(test)]
    pub async fn prime(&self, entitlement: Option<Entitlement>) {
        *self.cached_entitlement.lock().await = Some(entitlement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::local::keys;
    use crate::models::{AccessToken, MembershipStatus, Plan};

    fn account_ctx() -> SessionContext {
        SessionContext::new(Some(AccountSession {
            account_id: "acct-1".to_string(),
            email: Some("user@example.com".to_string()),
        }))
    }

    fn entitlement(course: bool, member: bool, status: MembershipStatus) -> Entitlement {
        let mut e = Entitlement::new("user@example.com", "2026-01-01T00:00:00Z".to_string());
        e.course_access = course;
        e.member_access = member;
        e.membership_status = status;
        e
    }

    fn token(course: bool, member: bool, expires_at: Option<i64>) -> AccessToken {
        AccessToken {
            course_access: course,
            member_access: member,
            expires_at,
            customer_id: None,
            customer_email: None,
            plan: Some(Plan::Course),
        }
    }

    #[tokio::test]
    async fn test_account_entitlement_wins_over_token() {
        let ctx = account_ctx();
        ctx.prime(Some(entitlement(true, false, MembershipStatus::None)))
            .await;

        let store = LocalStore::new();
        store.set_access_token(&token(false, true, Some(i64::MAX)));

        // Offline db: the cached entitlement must satisfy the resolve
        // without any fetch.
        let decision = ctx
            .resolve(&FirestoreDb::new_mock(), &store, 0)
            .await
            .unwrap();
        assert_eq!(decision.source, AccessSource::Account);
        assert!(decision.has_access);
        assert!(decision.course_access);
        assert!(!decision.member_access);
    }

    #[tokio::test]
    async fn test_past_due_member_passes_coarse_not_strict() {
        let ctx = account_ctx();
        ctx.prime(Some(entitlement(false, true, MembershipStatus::PastDue)))
            .await;

        let decision = ctx
            .resolve(&FirestoreDb::new_mock(), &LocalStore::new(), 0)
            .await
            .unwrap();
        assert!(decision.has_access);
        assert!(!decision.member_access);
    }

    #[tokio::test]
    async fn test_authenticated_without_record_is_no_access() {
        let ctx = account_ctx();
        ctx.prime(None).await;

        let store = LocalStore::new();
        store.set_raw(keys::ACCESS_GRANTED, "true");

        // Account path short-circuits: no fallthrough to legacy.
        let decision = ctx
            .resolve(&FirestoreDb::new_mock(), &store, 0)
            .await
            .unwrap();
        assert_eq!(decision.source, AccessSource::Account);
        assert!(!decision.has_access);
    }

    #[tokio::test]
    async fn test_token_path_when_unauthenticated() {
        let ctx = SessionContext::new(None);
        let store = LocalStore::new();
        store.set_access_token(&token(true, false, Some(10_000)));

        let decision = ctx
            .resolve(&FirestoreDb::new_mock(), &store, 5_000)
            .await
            .unwrap();
        assert_eq!(decision.source, AccessSource::Token);
        assert!(decision.has_access);
        assert!(decision.course_access);
    }

    #[tokio::test]
    async fn test_expired_token_falls_through_to_legacy() {
        let ctx = SessionContext::new(None);
        let store = LocalStore::new();
        store.set_access_token(&token(true, false, Some(1_000)));
        store.set_raw(keys::ACCESS_GRANTED, "true");

        let decision = ctx
            .resolve(&FirestoreDb::new_mock(), &store, 2_000)
            .await
            .unwrap();
        assert_eq!(decision.source, AccessSource::Legacy);
        assert!(decision.has_access);
        // Legacy grants access with unspecified tier.
        assert!(!decision.course_access);
        assert!(!decision.member_access);
    }

    #[tokio::test]
    async fn test_no_access_by_default() {
        let ctx = SessionContext::new(None);
        let decision = ctx
            .resolve(&FirestoreDb::new_mock(), &LocalStore::new(), 0)
            .await
            .unwrap();
        assert_eq!(decision.source, AccessSource::None);
        assert!(!decision.has_access);
    }

    #[tokio::test]
    async fn test_account_fetch_error_propagates() {
        // Offline db and an unprimed cache: the fetch fails loudly
        // instead of silently degrading.
        let ctx = account_ctx();
        let result = ctx
            .resolve(&FirestoreDb::new_mock(), &LocalStore::new(), 0)
            .await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[tokio::test]
    async fn test_invalidate_clears_cache() {
        let ctx = account_ctx();
        ctx.prime(Some(entitlement(true, false, MembershipStatus::None)))
            .await;
        ctx.invalidate().await;

        // After invalidation the next resolve must fetch again (and fail
        // against the offline mock).
        let result = ctx
            .resolve(&FirestoreDb::new_mock(), &LocalStore::new(), 0)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_sign_out_clears_local_access() {
        let ctx = SessionContext::new(None);
        let store = LocalStore::new();
        store.set_access_token(&token(true, false, None));
        store.set_raw(keys::ACCESS_GRANTED, "true");
        store.set_raw(keys::ACCESS_TIER, "course");

        ctx.sign_out(&store).await;

        let decision = ctx
            .resolve(&FirestoreDb::new_mock(), &store, 0)
            .await
            .unwrap();
        assert!(!decision.has_access);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_fetch() {
        let ctx = account_ctx();
        ctx.prime(Some(entitlement(true, true, MembershipStatus::Active)))
            .await;

        let db = FirestoreDb::new_mock();
        let store = LocalStore::new();

        // Both complete against the offline mock, proving neither issued
        // its own fetch.
        let (a, b) = tokio::join!(ctx.resolve(&db, &store, 0), ctx.resolve(&db, &store, 0));
        assert!(a.unwrap().member_access);
        assert!(b.unwrap().member_access);
    }
}

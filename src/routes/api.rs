// SPDX-License-Identifier: MIT

//! Authenticated account API: entitlements, lesson progress, and the
//! sign-in link/merge hook.

use crate::db::LocalStore;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{LocalProgress, ProgressRecord};
use crate::services::access::{AccountSession, SessionContext};
use crate::services::progress::merge_local_progress;
use crate::time_utils::{format_utc_rfc3339, format_utc_rfc3339_millis};
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me/entitlements", get(get_entitlements))
        .route("/api/progress", get(get_progress).post(set_progress))
        .route("/api/progress/{lesson_id}", delete(delete_progress))
        .route("/api/session/link", post(link_session))
}

fn session_context(user: &AuthUser) -> SessionContext {
    SessionContext::new(Some(AccountSession {
        account_id: user.account_id.clone(),
        email: user.email.clone(),
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EntitlementsResponse {
    pub has_access: bool,
    pub course_access: bool,
    pub member_access: bool,
    pub membership_status: Option<String>,
    pub stripe_customer_id: Option<String>,
}

/// Current effective access for the authenticated account.
async fn get_entitlements(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<EntitlementsResponse>> {
    let ctx = session_context(&user);
    let entitlement = ctx.entitlement(&state.db).await?;

    let decision = ctx
        .resolve(
            &state.db,
            &LocalStore::new(),
            chrono::Utc::now().timestamp_millis(),
        )
        .await?;

    Ok(Json(EntitlementsResponse {
        has_access: decision.has_access,
        course_access: decision.course_access,
        member_access: decision.member_access,
        membership_status: entitlement
            .as_ref()
            .map(|e| e.membership_status.to_string()),
        stripe_customer_id: entitlement.and_then(|e| e.stripe_customer_id),
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LessonProgress {
    pub completed: bool,
    #[serde(rename = "completedAt")]
    pub completed_at: String,
}

/// All lesson progress for the account, keyed by lesson id.
async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<HashMap<String, LessonProgress>>> {
    let records = state.db.get_progress_for_account(&user.account_id).await?;

    let progress = records
        .into_iter()
        .map(|r| {
            (
                r.lesson_id,
                LessonProgress {
                    completed: r.completed,
                    completed_at: r.completed_at,
                },
            )
        })
        .collect();

    Ok(Json(progress))
}

#[derive(Deserialize)]
struct SetProgressRequest {
    lesson_id: String,
}

/// Mark a lesson complete.
async fn set_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<SetProgressRequest>,
) -> Result<Json<LessonProgress>> {
    if request.lesson_id.trim().is_empty() {
        return Err(AppError::BadRequest("Missing lesson_id".to_string()));
    }

    let record = ProgressRecord {
        account_id: user.account_id.clone(),
        lesson_id: request.lesson_id,
        completed: true,
        completed_at: format_utc_rfc3339_millis(chrono::Utc::now()),
    };
    state.db.set_progress(&record).await?;

    Ok(Json(LessonProgress {
        completed: record.completed,
        completed_at: record.completed_at,
    }))
}

/// Mark a lesson incomplete by deleting its record.
async fn delete_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(lesson_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.db.delete_progress(&user.account_id, &lesson_id).await?;
    Ok(Json(serde_json::json!({"deleted": true})))
}

#[derive(Deserialize)]
struct LinkSessionRequest {
    /// Current-format local progress cache, as stored by the browser.
    #[serde(default)]
    local_progress: Option<LocalProgress>,
    /// Legacy completed-lesson id list.
    #[serde(default)]
    legacy_completed: Option<Vec<String>>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LinkSessionResponse {
    /// Whether a pre-registration entitlement was linked to the account.
    pub linked: bool,
    /// Lessons merged from the uploaded local cache.
    pub merged_lessons: usize,
    /// True when the merge failed and the browser should keep its cache.
    pub merge_failed: bool,
}

/// Sign-in hook: link any entitlement purchased under this email before
/// registration, then merge the uploaded local progress cache.
///
/// The merge is best-effort: a store failure is reported in the response
/// but never fails the sign-in.
async fn link_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<LinkSessionRequest>,
) -> Result<Json<LinkSessionResponse>> {
    let now = chrono::Utc::now();

    let linked = match &user.email {
        Some(email) => {
            state
                .db
                .link_entitlement_account(email, &user.account_id, format_utc_rfc3339(now))
                .await?
        }
        None => false,
    };

    // Stage the uploaded caches in a store and run the same merge the
    // browser-side flow uses.
    let store = LocalStore::new();
    if let Some(progress) = &request.local_progress {
        store.set_lesson_progress(progress);
    }
    if let Some(legacy) = &request.legacy_completed {
        store.set_legacy_completed_lessons(legacy);
    }

    let outcome = merge_local_progress(&state.db, &store, &user.account_id, now).await;

    Ok(Json(LinkSessionResponse {
        linked,
        merged_lessons: outcome.merged_lessons(),
        merge_failed: outcome.is_failure(),
    }))
}

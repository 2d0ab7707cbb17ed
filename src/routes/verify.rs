// SPDX-License-Identifier: MIT

//! Checkout session verification: redeem a completed-checkout redirect
//! for an access token.

use crate::error::{AppError, Result};
use crate::models::AccessToken;
use crate::services::verify::verify_checkout_session;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/verify-session", get(verify_session))
}

#[derive(Deserialize)]
struct VerifyParams {
    #[serde(default)]
    session_id: Option<String>,
}

/// Verify a checkout session and return the derived access token.
///
/// Read-only against Stripe; the browser persists the token. A session
/// with `payment_status != paid` is refused with 400.
async fn verify_session(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<AccessToken>> {
    let session_id = params
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing session_id parameter".to_string()))?;

    let token = verify_checkout_session(&state.stripe, &session_id, chrono::Utc::now()).await?;

    tracing::info!(
        course_access = token.course_access,
        member_access = token.member_access,
        "Checkout session verified"
    );

    Ok(Json(token))
}

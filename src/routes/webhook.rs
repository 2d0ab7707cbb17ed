// SPDX-License-Identifier: MIT

//! Stripe webhook endpoint.
//!
//! Signature verification happens on the raw body before any parsing;
//! a body that fails verification is never deserialized.

use crate::error::{AppError, Result};
use crate::services::reconciler::{apply_change, plan_change, StripeEvent};
use crate::services::stripe::verify_webhook_signature;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/stripe-webhook", post(handle_webhook))
}

/// Handle an incoming Stripe event.
///
/// Returns 200 for every verified event, handled or not, so Stripe does
/// not retry events we deliberately ignore. Store failures return 500 so
/// the delivery is retried.
async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::SignatureInvalid)?;

    verify_webhook_signature(
        &body,
        signature,
        &state.config.stripe_webhook_secret,
        chrono::Utc::now().timestamp(),
    )?;

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {}", e)))?;

    tracing::info!(
        event_id = event.id.as_deref().unwrap_or("unknown"),
        event_type = %event.event_type,
        "Webhook event received"
    );

    let change = plan_change(&event);
    apply_change(&state.db, change, chrono::Utc::now()).await?;

    Ok(Json(json!({"received": true})))
}

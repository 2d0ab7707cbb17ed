// SPDX-License-Identifier: MIT

//! Checkout and customer-portal session creation.

use crate::error::{AppError, Result};
use crate::models::Plan;
use crate::services::stripe::CheckoutSessionParams;
use crate::AppState;
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::ValidateEmail;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/create-checkout-session", post(create_checkout_session))
        .route(
            "/api/create-customer-portal-session",
            post(create_portal_session),
        )
}

#[derive(Deserialize)]
struct CreateCheckoutRequest {
    plan: String,
    #[serde(default)]
    customer_email: Option<String>,
}

/// Hosted session URL, for both checkout and portal sessions.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionUrlResponse {
    pub url: String,
}

/// Create a Stripe Checkout session for a course or membership purchase.
async fn create_checkout_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<Json<SessionUrlResponse>> {
    let plan: Plan = request.plan.parse().map_err(|_| {
        AppError::BadRequest("Invalid plan. Must be \"course\" or \"membership\".".to_string())
    })?;

    if let Some(email) = &request.customer_email {
        if !email.validate_email() {
            return Err(AppError::BadRequest("Invalid customer email".to_string()));
        }
    }

    let site_url = &state.config.site_url;
    let success_url = format!("{}/success.html?session_id={{CHECKOUT_SESSION_ID}}", site_url);
    let cancel_url = format!("{}/pricing.html", site_url);

    let (mode, price_id) = match plan {
        Plan::Course => ("payment", state.config.price_id_course.as_str()),
        Plan::Membership => ("subscription", state.config.price_id_membership.as_str()),
    };

    let session = state
        .stripe
        .create_checkout_session(&CheckoutSessionParams {
            mode,
            price_id,
            success_url: &success_url,
            cancel_url: &cancel_url,
            plan: plan.as_str(),
            customer_email: request.customer_email.as_deref(),
        })
        .await?;

    let url = session
        .url
        .ok_or_else(|| AppError::StripeApi("Checkout session has no URL".to_string()))?;

    tracing::info!(plan = plan.as_str(), "Checkout session created");
    Ok(Json(SessionUrlResponse { url }))
}

#[derive(Deserialize)]
struct CreatePortalRequest {
    #[serde(default)]
    customer_id: Option<String>,
}

/// Create a customer portal session for subscription management.
async fn create_portal_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePortalRequest>,
) -> Result<Json<SessionUrlResponse>> {
    let customer_id = request
        .customer_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing customer_id".to_string()))?;

    let return_url = format!("{}/portal/index.html", state.config.site_url);

    let session = state
        .stripe
        .create_portal_session(&customer_id, &return_url)
        .await?;

    Ok(Json(SessionUrlResponse { url: session.url }))
}

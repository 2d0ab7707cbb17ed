// SPDX-License-Identifier: MIT

//! Stripe REST API client and webhook signature verification.
//!
//! Handles:
//! - Checkout session creation (one-time payment or subscription)
//! - Customer portal session creation
//! - Checkout session retrieval with subscription expansion
//! - Webhook signature verification (`t=...,v1=...` HMAC-SHA256 scheme)

use crate::error::AppError;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a webhook signature timestamp (5 minutes).
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl StripeClient {
    /// Create a new Stripe client with the secret API key.
    pub fn new(secret_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.stripe.com/v1".to_string(),
            secret_key,
        }
    }

    /// Create a checkout session and return its hosted URL.
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams<'_>,
    ) -> Result<CheckoutSession, AppError> {
        let url = format!("{}/checkout/sessions", self.base_url);

        let mut form: Vec<(&str, String)> = vec![
            ("mode", params.mode.to_string()),
            ("line_items[0][price]", params.price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", params.success_url.to_string()),
            ("cancel_url", params.cancel_url.to_string()),
            ("metadata[plan]", params.plan.to_string()),
        ];
        if let Some(email) = params.customer_email {
            form.push(("customer_email", email.to_string()));
        }

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::StripeApi(e.to_string()))?;

        self.read_json(response).await
    }

    /// Create a customer portal session for subscription management.
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, AppError> {
        let url = format!("{}/billing_portal/sessions", self.base_url);

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[("customer", customer_id), ("return_url", return_url)])
            .send()
            .await
            .map_err(|e| AppError::StripeApi(e.to_string()))?;

        self.read_lookup_json(response).await
    }

    /// Retrieve a checkout session, expanding its subscription.
    pub async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, AppError> {
        let url = format!("{}/checkout/sessions/{}", self.base_url, session_id);

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .query(&[("expand[]", "subscription")])
            .send()
            .await
            .map_err(|e| AppError::StripeApi(e.to_string()))?;

        self.read_lookup_json(response).await
    }

    /// Retrieve a subscription by id.
    pub async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription, AppError> {
        let url = format!("{}/subscriptions/{}", self.base_url, subscription_id);

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::StripeApi(e.to_string()))?;

        self.read_lookup_json(response).await
    }

    /// Parse a creation response. Any failure here is a provider-side
    /// problem (bad API key, misconfigured price id), never the caller's.
    async fn read_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StripeApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StripeApi(format!("JSON parse error: {}", e)))
    }

    /// Parse a lookup response, classifying failures with [`lookup_error`].
    async fn read_lookup_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(lookup_error(status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StripeApi(format!("JSON parse error: {}", e)))
    }
}

/// Classify a failed lookup. Stripe signals an unknown or malformed id
/// with 400/404; those are caller errors, not upstream failures.
fn lookup_error(status: u16, body: &str) -> AppError {
    if status == 400 || status == 404 {
        tracing::warn!(status, body, "Stripe rejected request");
        AppError::BadRequest("Invalid Stripe identifier".to_string())
    } else {
        AppError::StripeApi(format!("HTTP {}: {}", status, body))
    }
}

/// Parameters for creating a checkout session.
pub struct CheckoutSessionParams<'a> {
    /// "payment" for one-time, "subscription" for recurring
    pub mode: &'a str,
    pub price_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
    /// Stored in session metadata for the session verifier
    pub plan: &'a str,
    pub customer_email: Option<&'a str>,
}

/// Checkout session response (subset of fields the core consumes).
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub mode: String,
    pub payment_status: Option<String>,
    /// Stripe customer id
    pub customer: Option<String>,
    pub customer_email: Option<String>,
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    pub subscription: Option<SubscriptionRef>,
}

impl CheckoutSession {
    /// Customer email, preferring the explicit field over details.
    pub fn email(&self) -> Option<&str> {
        self.customer_email
            .as_deref()
            .or_else(|| self.customer_details.as_ref()?.email.as_deref())
    }

    /// Plan name from metadata, if present.
    pub fn metadata_plan(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("plan").map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

/// A subscription reference: an id string, or the expanded object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SubscriptionRef {
    Object(Subscription),
    Id(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub status: String,
    pub customer: Option<String>,
    /// End of the current billing period (Unix seconds)
    pub current_period_end: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalSession {
    pub url: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Webhook signature verification
// ─────────────────────────────────────────────────────────────────────────────

/// Verify a webhook payload against its `stripe-signature` header.
///
/// Must run before any parsing of the payload; a failure is fatal for the
/// request and must not mutate state. The header format is
/// `t=<unix_ts>,v1=<hex_hmac>[,v1=...]`; the signed payload is
/// `"{t}.{body}"`. Comparison is constant-time.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now_unix: i64,
) -> Result<(), AppError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();

    for part in signature_header.split(',') {
        let kv: Vec<&str> = part.trim().splitn(2, '=').collect();
        if kv.len() != 2 {
            continue;
        }
        match kv[0] {
            "t" => timestamp = kv[1].parse().ok(),
            "v1" => {
                if let Ok(sig) = hex::decode(kv[1]) {
                    candidates.push(sig);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(AppError::SignatureInvalid)?;
    if candidates.is_empty() {
        return Err(AppError::SignatureInvalid);
    }

    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        tracing::warn!(
            timestamp,
            now = now_unix,
            "Webhook signature timestamp outside tolerance"
        );
        return Err(AppError::SignatureInvalid);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::SignatureInvalid)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = mac.finalize().into_bytes();

    let matched = candidates
        .iter()
        .any(|candidate| candidate.ct_eq(expected.as_slice()).into());

    if matched {
        Ok(())
    } else {
        Err(AppError::SignatureInvalid)
    }
}

/// Build a `stripe-signature` header value for a payload.
///
/// Used by tests and local tooling to exercise the webhook endpoint.
pub fn sign_webhook_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

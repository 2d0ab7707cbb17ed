// SPDX-License-Identifier: MIT

//! Application configuration loaded from environment variables.
//!
//! Secrets (Stripe keys, webhook secret, JWT secret) are read once at
//! startup and cached in memory for the lifetime of the process.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Public site URL, used for Stripe success/cancel/return redirects
    pub site_url: String,
    /// Frontend origin allowed by CORS (usually the same as `site_url`)
    pub frontend_url: String,
    /// GCP project ID for Firestore
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Stripe price ID for the one-time course purchase
    pub price_id_course: String,
    /// Stripe price ID for the recurring membership
    pub price_id_membership: String,

    // --- Secrets ---
    /// Stripe secret API key
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret (`whsec_...`)
    pub stripe_webhook_secret: String,
    /// HS256 secret shared with the auth provider for account session JWTs
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// For local development, secrets can be set via a `.env` file. In
    /// production the deployment platform injects them as env vars.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            site_url: env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:8888".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:8888".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            price_id_course: env::var("PRICE_ID_COURSE")
                .map_err(|_| ConfigError::Missing("PRICE_ID_COURSE"))?,
            price_id_membership: env::var("PRICE_ID_MEMBERSHIP")
                .map_err(|_| ConfigError::Missing("PRICE_ID_MEMBERSHIP"))?,
            stripe_secret_key: env::var("STRIPE_SECRET_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRIPE_SECRET_KEY"))?,
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRIPE_WEBHOOK_SECRET"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            site_url: "http://localhost:8888".to_string(),
            frontend_url: "http://localhost:8888".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            price_id_course: "price_test_course".to_string(),
            price_id_membership: "price_test_membership".to_string(),
            stripe_secret_key: "sk_test_123".to_string(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("PRICE_ID_COURSE", "price_course");
        env::set_var("PRICE_ID_MEMBERSHIP", "price_membership");
        env::set_var("STRIPE_SECRET_KEY", "sk_test_abc");
        env::set_var("STRIPE_WEBHOOK_SECRET", "whsec_abc");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.stripe_secret_key, "sk_test_abc");
        assert_eq!(config.price_id_course, "price_course");
        assert_eq!(config.port, 8080);
    }
}

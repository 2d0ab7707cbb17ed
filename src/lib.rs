// SPDX-License-Identifier: MIT

//! TMS Portal: entitlement and progress backend for a gated course portal.
//!
//! This crate bridges the course website to Stripe (checkout sessions,
//! webhooks) and Firestore (entitlement records, per-lesson progress),
//! and hosts the reconciliation logic that decides what access a
//! customer currently has.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::StripeClient;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub stripe: StripeClient,
}

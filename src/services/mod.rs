// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod access;
pub mod progress;
pub mod reconciler;
pub mod stripe;
pub mod verify;

pub use access::{AccessDecision, AccessSource, AccountSession, SessionContext};
pub use progress::MergeOutcome;
pub use reconciler::EntitlementChange;
pub use stripe::StripeClient;

// SPDX-License-Identifier: MIT

//! Persistence layer: Firestore for server records, and a key/value
//! stand-in for the browser's local cache.

pub mod firestore;
pub mod local;

pub use firestore::FirestoreDb;
pub use local::LocalStore;

/// Collection names as constants.
pub mod collections {
    /// Entitlement records, keyed by encoded email
    pub const ENTITLEMENTS: &str = "entitlements";
    /// Per-lesson progress, keyed by `{account_id}_{lesson_id}`
    pub const PROGRESS: &str = "progress";
}

// SPDX-License-Identifier: MIT

//! Browser local-cache store.
//!
//! Key/value persistence standing in for the browser's localStorage:
//! the access-token blob, the lesson-progress map, two legacy formats,
//! favorites, and preferences. Pure storage, no business logic.
//!
//! Corrupt entries (unparseable JSON) are treated as absent and deleted
//! on read, never surfaced. Expired tokens are deleted lazily on read.

use crate::models::{AccessToken, LocalProgress};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Storage keys. The `tms_` prefix is the namespace used by the site.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "tms_access_token";
    pub const LESSON_PROGRESS: &str = "tms_lesson_progress";
    /// Legacy completed-lessons list (plain array of lesson ids)
    pub const COMPLETED_LESSONS: &str = "tms_completed_lessons";
    /// Legacy pre-token access flag ("true" when granted)
    pub const ACCESS_GRANTED: &str = "tms_access_granted";
    /// Legacy tier string paired with the flag above
    pub const ACCESS_TIER: &str = "tms_access_tier";
    pub const FAVORITES: &str = "tms_favorites";
    pub const PREFERENCES: &str = "tms_preferences";
}

/// In-memory key/value store with localStorage semantics.
#[derive(Debug, Default)]
pub struct LocalStore {
    entries: DashMap<String, String>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.clone())
    }

    pub fn set_raw(&self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Read and parse a JSON entry. A corrupt entry is deleted and
    /// reported as absent.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, error = %err, "Dropping corrupt local cache entry");
                self.remove(key);
                None
            }
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        // Serializing our own models cannot fail in practice; skip the
        // write rather than poison the store if it somehow does.
        match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, raw),
            Err(err) => tracing::error!(key, error = %err, "Failed to serialize cache entry"),
        }
    }

    // ─── Access Token ────────────────────────────────────────────

    /// Current access token, if present and not expired at `now_ms`.
    ///
    /// An expired token is deleted lazily here rather than by any
    /// background sweep.
    pub fn access_token(&self, now_ms: i64) -> Option<AccessToken> {
        let token: AccessToken = self.get_json(keys::ACCESS_TOKEN)?;
        if token.is_expired(now_ms) {
            self.remove(keys::ACCESS_TOKEN);
            return None;
        }
        Some(token)
    }

    pub fn set_access_token(&self, token: &AccessToken) {
        self.set_json(keys::ACCESS_TOKEN, token);
    }

    pub fn clear_access_token(&self) {
        self.remove(keys::ACCESS_TOKEN);
    }

    // ─── Lesson Progress ─────────────────────────────────────────

    /// Current-format progress map; empty if absent or corrupt.
    pub fn lesson_progress(&self) -> LocalProgress {
        self.get_json(keys::LESSON_PROGRESS).unwrap_or_default()
    }

    pub fn set_lesson_progress(&self, progress: &LocalProgress) {
        self.set_json(keys::LESSON_PROGRESS, progress);
    }

    /// Legacy completed-lesson-id list; empty if absent or corrupt.
    pub fn legacy_completed_lessons(&self) -> Vec<String> {
        self.get_json(keys::COMPLETED_LESSONS).unwrap_or_default()
    }

    pub fn set_legacy_completed_lessons(&self, lessons: &[String]) {
        self.set_json(keys::COMPLETED_LESSONS, &lessons);
    }

    /// Clear both progress formats after a successful merge.
    pub fn clear_progress(&self) {
        self.remove(keys::LESSON_PROGRESS);
        self.remove(keys::COMPLETED_LESSONS);
    }

    pub fn has_local_progress(&self) -> bool {
        self.entries.contains_key(keys::LESSON_PROGRESS)
            || self.entries.contains_key(keys::COMPLETED_LESSONS)
    }

    // ─── Favorites & Preferences ─────────────────────────────────

    /// Favorited lesson ids; empty if absent or corrupt.
    pub fn favorites(&self) -> Vec<String> {
        self.get_json(keys::FAVORITES).unwrap_or_default()
    }

    pub fn set_favorites(&self, favorites: &[String]) {
        self.set_json(keys::FAVORITES, &favorites);
    }

    /// Site preferences blob. Kept opaque; the portal owns its shape.
    pub fn preferences(&self) -> Option<serde_json::Value> {
        self.get_json(keys::PREFERENCES)
    }

    pub fn set_preferences(&self, preferences: &serde_json::Value) {
        self.set_json(keys::PREFERENCES, preferences);
    }

    // ─── Legacy Access Flags ─────────────────────────────────────

    /// Legacy pre-token access flag. Honored as a fallback, never newly
    /// written by current flows.
    pub fn legacy_access_granted(&self) -> bool {
        self.get_raw(keys::ACCESS_GRANTED).as_deref() == Some("true")
    }

    pub fn legacy_access_tier(&self) -> Option<String> {
        self.get_raw(keys::ACCESS_TIER)
    }

    /// Remove the token and legacy flags on sign-out.
    pub fn clear_access(&self) {
        self.remove(keys::ACCESS_TOKEN);
        self.remove(keys::ACCESS_GRANTED);
        self.remove(keys::ACCESS_TIER);
    }
}

// SPDX-License-Identifier: MIT

//! Lesson progress records.
//!
//! Anonymous progress lives in the browser cache keyed by lesson id.
//! Once the user authenticates, progress is owned by the `progress`
//! collection, unique per `(account_id, lesson_id)`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Server-side progress record (document id: `{account_id}_{lesson_id}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub account_id: String,
    pub lesson_id: String,
    pub completed: bool,
    /// Completion timestamp (RFC3339, millisecond precision)
    pub completed_at: String,
}

/// One entry of the browser-side progress map.
///
/// Field names match the browser cache format (`completedAt` epoch millis).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalLessonEntry {
    pub completed: bool,
    #[serde(rename = "completedAt")]
    pub completed_at: i64,
}

/// Browser-side progress map: lesson id → entry.
pub type LocalProgress = HashMap<String, LocalLessonEntry>;

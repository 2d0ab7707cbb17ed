// SPDX-License-Identifier: MIT

//! Progress merge: reconcile locally cached lesson completion with the
//! account's server-side progress, once, at sign-in.
//!
//! Best-effort: a failure leaves the local cache intact so the next
//! sign-in retries, and is reported through [`MergeOutcome`] rather than
//! raised to the sign-in flow.

use crate::db::{FirestoreDb, LocalStore};
use crate::error::AppError;
use crate::models::ProgressRecord;
use crate::time_utils::format_utc_rfc3339_millis;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Result of one merge attempt.
#[derive(Debug)]
pub enum MergeOutcome {
    /// Nothing cached locally; no-op.
    Nothing,
    /// Upserted `lessons` records and cleared the local cache.
    Merged { lessons: usize },
    /// Upsert failed; local cache left intact for the next attempt.
    Failed { lessons: usize, error: AppError },
}

impl MergeOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, MergeOutcome::Failed { .. })
    }

    pub fn merged_lessons(&self) -> usize {
        match self {
            MergeOutcome::Merged { lessons } => *lessons,
            _ => 0,
        }
    }
}

/// Collect the union of both local progress formats as upsert-ready
/// records, deduplicated by lesson id.
///
/// `completed_at` comes from the local entry when present, else `now`.
pub fn collect_local_lessons(
    store: &LocalStore,
    account_id: &str,
    now: DateTime<Utc>,
) -> Vec<ProgressRecord> {
    let progress = store.lesson_progress();
    let legacy = store.legacy_completed_lessons();

    // BTreeMap for deterministic ordering; the current format wins over
    // a bare legacy id for the same lesson.
    let mut lessons: BTreeMap<String, String> = BTreeMap::new();

    for lesson_id in legacy {
        lessons.insert(lesson_id, format_utc_rfc3339_millis(now));
    }
    for (lesson_id, entry) in progress {
        let completed_at = DateTime::from_timestamp_millis(entry.completed_at)
            .map(format_utc_rfc3339_millis)
            .unwrap_or_else(|| format_utc_rfc3339_millis(now));
        lessons.insert(lesson_id, completed_at);
    }

    lessons
        .into_iter()
        .map(|(lesson_id, completed_at)| ProgressRecord {
            account_id: account_id.to_string(),
            lesson_id,
            completed: true,
            completed_at,
        })
        .collect()
}

/// Merge locally cached progress into the account's server records.
///
/// Idempotent: the upserts target `(account_id, lesson_id)` and the
/// local cache is cleared only after they all succeed, so replaying the
/// merge yields the same server-side progress set.
pub async fn merge_local_progress(
    db: &FirestoreDb,
    store: &LocalStore,
    account_id: &str,
    now: DateTime<Utc>,
) -> MergeOutcome {
    let records = collect_local_lessons(store, account_id, now);
    if records.is_empty() {
        return MergeOutcome::Nothing;
    }

    let lessons = records.len();
    match db.batch_set_progress(&records).await {
        Ok(()) => {
            store.clear_progress();
            tracing::info!(account_id, lessons, "Local progress merged");
            MergeOutcome::Merged { lessons }
        }
        Err(error) => {
            tracing::warn!(
                account_id,
                lessons,
                error = %error,
                "Progress merge failed, keeping local cache for retry"
            );
            MergeOutcome::Failed { lessons, error }
        }
    }
}

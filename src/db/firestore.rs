// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Entitlements (one record per customer identity, keyed by email)
//! - Progress (per-lesson completion, keyed by account id + lesson id)
//!
//! All writes are upserts, so the webhook reconciler and the progress
//! merge can be retried safely after a downstream failure.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Entitlement, ProgressRecord};
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

/// Document id for an entitlement record: the lowercased email,
/// URL-encoded so it is a valid Firestore document id.
fn entitlement_doc_id(email: &str) -> String {
    urlencoding::encode(&email.to_lowercase()).into_owned()
}

/// Document id for a progress record. Combines account id and lesson id,
/// which makes the `(account_id, lesson_id)` pair the natural conflict
/// target: re-upserting the same pair overwrites instead of duplicating.
fn progress_doc_id(account_id: &str, lesson_id: &str) -> String {
    format!("{}_{}", account_id, urlencoding::encode(lesson_id))
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Entitlement Operations ──────────────────────────────────

    /// Get an entitlement by email (the primary identity key).
    pub async fn get_entitlement_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Entitlement>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ENTITLEMENTS)
            .obj()
            .one(&entitlement_doc_id(email))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get an entitlement by Stripe customer id.
    ///
    /// Subscription events carry only the customer id, never the email.
    pub async fn get_entitlement_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Entitlement>, AppError> {
        let customer_id = customer_id.to_string();
        let mut results: Vec<Entitlement> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ENTITLEMENTS)
            .filter(move |q| q.field("stripe_customer_id").eq(customer_id.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(results.pop())
    }

    /// Get an entitlement by linked account id.
    pub async fn get_entitlement_by_account(
        &self,
        account_id: &str,
    ) -> Result<Option<Entitlement>, AppError> {
        let account_id = account_id.to_string();
        let mut results: Vec<Entitlement> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ENTITLEMENTS)
            .filter(move |q| q.field("account_id").eq(account_id.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(results.pop())
    }

    /// Resolve an entitlement through the identity keys in deterministic
    /// order: account id, then customer id, then email.
    pub async fn resolve_entitlement(
        &self,
        account_id: Option<&str>,
        customer_id: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Entitlement>, AppError> {
        if let Some(account_id) = account_id {
            if let Some(found) = self.get_entitlement_by_account(account_id).await? {
                return Ok(Some(found));
            }
        }
        if let Some(customer_id) = customer_id {
            if let Some(found) = self.get_entitlement_by_customer(customer_id).await? {
                return Ok(Some(found));
            }
        }
        if let Some(email) = email {
            if let Some(found) = self.get_entitlement_by_email(email).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Create or update an entitlement record (document id derived from
    /// the record's email).
    pub async fn set_entitlement(&self, entitlement: &Entitlement) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ENTITLEMENTS)
            .document_id(entitlement_doc_id(&entitlement.email))
            .object(entitlement)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Link a pre-registration entitlement (keyed by email) to an account.
    ///
    /// Only links if the record exists and has no account id yet; returns
    /// whether a link was made. Safe to repeat.
    pub async fn link_entitlement_account(
        &self,
        email: &str,
        account_id: &str,
        updated_at: String,
    ) -> Result<bool, AppError> {
        let Some(mut entitlement) = self.get_entitlement_by_email(email).await? else {
            return Ok(false);
        };

        if entitlement.account_id.is_some() {
            return Ok(false);
        }

        entitlement.account_id = Some(account_id.to_string());
        entitlement.updated_at = updated_at;
        self.set_entitlement(&entitlement).await?;

        tracing::info!(account_id, "Linked entitlement to account");
        Ok(true)
    }

    // ─── Progress Operations ─────────────────────────────────────

    /// Get all progress records for an account.
    pub async fn get_progress_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<ProgressRecord>, AppError> {
        let account_id = account_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PROGRESS)
            .filter(move |q| q.field("account_id").eq(account_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Upsert a single progress record.
    pub async fn set_progress(&self, record: &ProgressRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PROGRESS)
            .document_id(progress_doc_id(&record.account_id, &record.lesson_id))
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a progress record (mark lesson incomplete).
    pub async fn delete_progress(
        &self,
        account_id: &str,
        lesson_id: &str,
    ) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::PROGRESS)
            .document_id(progress_doc_id(account_id, lesson_id))
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Upsert multiple progress records.
    ///
    /// Uses concurrent writes with a limit to avoid overloading Firestore.
    /// Duplicate `(account_id, lesson_id)` pairs overwrite in place, so
    /// replaying the same batch is harmless.
    pub async fn batch_set_progress(&self, records: &[ProgressRecord]) -> Result<(), AppError> {
        let client = self.get_client()?;

        stream::iter(records.to_vec())
            .map(|record| async move {
                let doc_id = progress_doc_id(&record.account_id, &record.lesson_id);

                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::PROGRESS)
                    .document_id(&doc_id)
                    .object(&record)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;

                Ok::<_, AppError>(())
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        Ok(())
    }
}

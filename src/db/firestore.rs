// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile and credential storage)
//! - User emails (create-only ownership index)
//! - External identities (linked provider accounts)

use crate::db::collections;
use crate::error::AppError;
use crate::models::{ExternalIdentity, Provider, User};
use firestore::errors::FirestoreError;
use firestore::paths;
use serde::{Deserialize, Serialize};

/// Email ownership record; the document ID is the encoded email.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmailClaim {
    user_id: String,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
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

        Ok(Self { client })
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Claim the email, then write the user document.
    ///
    /// The claim is a create-only insert, so of two concurrent registrations
    /// for the same address exactly one succeeds.
    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let claim = EmailClaim {
            user_id: user.id.clone(),
        };
        let inserted: Result<EmailClaim, FirestoreError> = self
            .client
            .fluent()
            .insert()
            .into(collections::USER_EMAILS)
            .document_id(email_doc_id(&user.email))
            .object(&claim)
            .execute()
            .await;

        match inserted {
            Ok(_) => {}
            Err(FirestoreError::DataConflictError(_)) => {
                return Err(AppError::Conflict("email already registered".into()));
            }
            Err(e) => return Err(AppError::Database(e.to_string())),
        }

        let written: Result<User, FirestoreError> = self
            .client
            .fluent()
            .insert()
            .into(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await;

        if let Err(e) = written {
            // Release the claim so the address is not stranded.
            if let Err(cleanup) = self.release_email(&user.email).await {
                tracing::error!(error = %cleanup, "Failed to release email claim after insert error");
            }
            return Err(AppError::Database(e.to_string()));
        }
        Ok(())
    }

    /// Get a user by ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let claim: Option<EmailClaim> = self
            .client
            .fluent()
            .select()
            .by_id_in(collections::USER_EMAILS)
            .obj()
            .one(&email_doc_id(email))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match claim {
            Some(claim) => Ok(self
                .get_user(&claim.user_id)
                .await?
                .filter(User::is_active)),
            None => Ok(None),
        }
    }

    /// Field-masked so a concurrent soft delete is never overwritten.
    pub async fn record_login(&self, user: &User) -> Result<(), AppError> {
        let _: User = self
            .client
            .fluent()
            .update()
            .fields(paths!(User::{provider, last_login_at, updated_at}))
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn update_profile(&self, user: &User) -> Result<(), AppError> {
        let _: User = self
            .client
            .fluent()
            .update()
            .fields(paths!(User::{name, position, city, income, skills, interests, updated_at}))
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Replace only the password hash fields of a user document.
    pub async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
        updated_at: &str,
    ) -> Result<(), AppError> {
        let mut user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;
        user.password_hash = Some(password_hash.to_string());
        user.updated_at = updated_at.to_string();

        let _: User = self
            .client
            .fluent()
            .update()
            .fields(paths!(User::{password_hash, updated_at}))
            .in_col(collections::USERS)
            .document_id(user_id)
            .object(&user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Set the deletion marker and drop the email claim in one transaction.
    pub async fn soft_delete_user(&self, user_id: &str, deleted_at: &str) -> Result<(), AppError> {
        let mut user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;
        user.deleted_at = Some(deleted_at.to_string());
        user.updated_at = deleted_at.to_string();

        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        self.client
            .fluent()
            .update()
            .fields(paths!(User::{deleted_at, updated_at}))
            .in_col(collections::USERS)
            .document_id(user_id)
            .object(&user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add user to transaction: {}", e)))?;

        self.client
            .fluent()
            .delete()
            .from(collections::USER_EMAILS)
            .document_id(email_doc_id(&user.email))
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add email release to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(user_id, "User soft-deleted");
        Ok(())
    }

    async fn release_email(&self, email: &str) -> Result<(), AppError> {
        self.client
            .fluent()
            .delete()
            .from(collections::USER_EMAILS)
            .document_id(email_doc_id(email))
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── External Identity Operations ────────────────────────────

    pub async fn get_identity(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<Option<ExternalIdentity>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::EXTERNAL_IDENTITIES)
            .obj()
            .one(&identity_doc_id(provider, subject))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn find_identity_for_user(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<Option<ExternalIdentity>, AppError> {
        let user_id = user_id.to_string();
        let identities: Vec<ExternalIdentity> = self
            .client
            .fluent()
            .select()
            .from(collections::EXTERNAL_IDENTITIES)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("provider").eq(provider.as_str()),
                ])
            })
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(identities.into_iter().next())
    }

    pub async fn insert_identity(&self, identity: &ExternalIdentity) -> Result<(), AppError> {
        let inserted: Result<ExternalIdentity, FirestoreError> = self
            .client
            .fluent()
            .insert()
            .into(collections::EXTERNAL_IDENTITIES)
            .document_id(identity_doc_id(identity.provider, &identity.subject))
            .object(identity)
            .execute()
            .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(FirestoreError::DataConflictError(_)) => Err(AppError::Conflict(format!(
                "{} account already linked",
                identity.provider
            ))),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    pub async fn update_identity(&self, identity: &ExternalIdentity) -> Result<(), AppError> {
        let _: ExternalIdentity = self
            .client
            .fluent()
            .update()
            .in_col(collections::EXTERNAL_IDENTITIES)
            .document_id(identity_doc_id(identity.provider, &identity.subject))
            .object(identity)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

/// Firestore document IDs may not contain `/`.
fn email_doc_id(email: &str) -> String {
    urlencoding::encode(email).into_owned()
}

fn identity_doc_id(provider: Provider, subject: &str) -> String {
    urlencoding::encode(&ExternalIdentity::key(provider, subject)).into_owned()
}

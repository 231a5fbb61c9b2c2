// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential store.
//!
//! `Db` dispatches to Firestore in production and to a process-local
//! store for development and tests. Both backends claim email ownership
//! with a create-only write, so duplicate registration is rejected by the
//! storage layer itself.

pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::config::DatabaseUrl;
use crate::error::AppError;
use crate::models::{ExternalIdentity, Provider, User};
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Email ownership index (keyed by URL-encoded normalized email)
    pub const USER_EMAILS: &str = "user_emails";
    /// External identities (keyed by `provider:subject`)
    pub const EXTERNAL_IDENTITIES: &str = "external_identities";
}

/// Handle to the configured credential store.
#[derive(Clone)]
pub enum Db {
    Firestore(FirestoreDb),
    Memory(Arc<MemoryDb>),
}

impl Db {
    /// Connect to the store named by `url`.
    pub async fn connect(url: &DatabaseUrl) -> Result<Self, AppError> {
        match url {
            DatabaseUrl::Firestore { project_id } => {
                Ok(Db::Firestore(FirestoreDb::new(project_id).await?))
            }
            DatabaseUrl::Memory => {
                tracing::warn!("Using in-memory credential store; data is lost on restart");
                Ok(Self::in_memory())
            }
        }
    }

    pub fn in_memory() -> Self {
        Db::Memory(Arc::new(MemoryDb::default()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Create a user, claiming its email. Fails with `Conflict` if the
    /// email already belongs to an active user.
    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        match self {
            Db::Firestore(db) => db.insert_user(user).await,
            Db::Memory(db) => db.insert_user(user),
        }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        match self {
            Db::Firestore(db) => db.get_user(user_id).await,
            Db::Memory(db) => Ok(db.get_user(user_id)),
        }
    }

    /// Look up the active user owning `email` (already normalized).
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        match self {
            Db::Firestore(db) => db.find_user_by_email(email).await,
            Db::Memory(db) => Ok(db.find_user_by_email(email)),
        }
    }

    /// Persist the login bookkeeping of `user`: provider tag, `last_login_at`
    /// and `updated_at`. No other field is written.
    pub async fn record_login(&self, user: &User) -> Result<(), AppError> {
        match self {
            Db::Firestore(db) => db.record_login(user).await,
            Db::Memory(db) => db.record_login(user),
        }
    }

    /// Persist the editable profile fields of `user` and `updated_at`.
    pub async fn update_profile(&self, user: &User) -> Result<(), AppError> {
        match self {
            Db::Firestore(db) => db.update_profile(user).await,
            Db::Memory(db) => db.update_profile(user),
        }
    }

    /// Replace the stored password hash in a single write.
    pub async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
        updated_at: &str,
    ) -> Result<(), AppError> {
        match self {
            Db::Firestore(db) => db.set_password_hash(user_id, password_hash, updated_at).await,
            Db::Memory(db) => db.set_password_hash(user_id, password_hash, updated_at),
        }
    }

    /// Mark the user deleted and release its email for reuse.
    pub async fn soft_delete_user(&self, user_id: &str, deleted_at: &str) -> Result<(), AppError> {
        match self {
            Db::Firestore(db) => db.soft_delete_user(user_id, deleted_at).await,
            Db::Memory(db) => db.soft_delete_user(user_id, deleted_at),
        }
    }

    // ─── External Identity Operations ────────────────────────────

    pub async fn get_identity(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<Option<ExternalIdentity>, AppError> {
        match self {
            Db::Firestore(db) => db.get_identity(provider, subject).await,
            Db::Memory(db) => Ok(db.get_identity(provider, subject)),
        }
    }

    /// Identity linking `user_id` to `provider`, if any.
    pub async fn find_identity_for_user(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<Option<ExternalIdentity>, AppError> {
        match self {
            Db::Firestore(db) => db.find_identity_for_user(user_id, provider).await,
            Db::Memory(db) => Ok(db.find_identity_for_user(user_id, provider)),
        }
    }

    /// Create an identity. Fails with `Conflict` if the provider subject is
    /// already linked.
    pub async fn insert_identity(&self, identity: &ExternalIdentity) -> Result<(), AppError> {
        match self {
            Db::Firestore(db) => db.insert_identity(identity).await,
            Db::Memory(db) => db.insert_identity(identity),
        }
    }

    pub async fn update_identity(&self, identity: &ExternalIdentity) -> Result<(), AppError> {
        match self {
            Db::Firestore(db) => db.update_identity(identity).await,
            Db::Memory(db) => db.update_identity(identity),
        }
    }
}

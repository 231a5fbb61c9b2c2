// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local account registration, login and account maintenance.

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::user::{mask_email, normalize_email};
use crate::models::{ProfilePatch, Provider, Role, User};
use crate::services::password;
use crate::time_utils::now_rfc3339;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Credential store operations over the configured database.
#[derive(Clone)]
pub struct CredentialService {
    db: Db,
}

impl CredentialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create a local account. Only `user` and `mentor` may be self-assigned.
    pub async fn register_local(
        &self,
        name: &str,
        email: &str,
        plaintext: &str,
        role: Role,
    ) -> Result<User> {
        if !role.is_self_assignable() {
            return Err(AppError::InvalidRole(role.to_string()));
        }
        check_password_len(plaintext)?;

        let email = normalize_email(email);
        let password_hash = hash_blocking(plaintext.to_string()).await?;
        let now = now_rfc3339();

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            password_hash: Some(password_hash),
            name: name.trim().to_string(),
            role,
            provider: Provider::Local,
            position: None,
            city: None,
            income: None,
            skills: Vec::new(),
            interests: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
            last_login_at: None,
            deleted_at: None,
        };

        // Uniqueness is decided by the store, not by a prior lookup.
        self.db.insert_user(&user).await?;

        tracing::info!(
            user_id = %user.id,
            email = %mask_email(&user.email),
            role = %user.role,
            "Registered local user"
        );
        Ok(user)
    }

    /// Check a local email/password pair.
    ///
    /// Returns `NotFound` when no active local account owns the email and
    /// `InvalidCredentials` when the password does not match. Callers facing
    /// the network should not expose the difference.
    pub async fn authenticate_local(&self, email: &str, plaintext: &str) -> Result<User> {
        let email = normalize_email(email);
        let user = match self.db.find_user_by_email(&email).await? {
            Some(user) if user.is_local() => user,
            _ => {
                let plaintext = plaintext.to_string();
                let _ = tokio::task::spawn_blocking(move || {
                    password::verify_against_dummy(&plaintext)
                })
                .await;
                return Err(AppError::NotFound("no local account for email".into()));
            }
        };

        let hash = user.password_hash.clone().unwrap_or_default();
        if !verify_blocking(hash, plaintext.to_string()).await? {
            tracing::info!(user_id = %user.id, "Local login rejected: password mismatch");
            return Err(AppError::InvalidCredentials);
        }

        let mut user = user;
        let now = now_rfc3339();
        user.last_login_at = Some(now.clone());
        user.updated_at = now;
        self.db.record_login(&user).await?;
        Ok(user)
    }

    /// Replace the password after checking the current one.
    pub async fn change_password(&self, user_id: &str, old: &str, new: &str) -> Result<()> {
        let user = self.get_active_user(user_id).await?;
        let Some(hash) = user.password_hash.clone() else {
            return Err(AppError::InvalidCredentials);
        };
        if !verify_blocking(hash, old.to_string()).await? {
            return Err(AppError::InvalidCredentials);
        }
        check_password_len(new)?;

        let new_hash = hash_blocking(new.to_string()).await?;
        self.db
            .set_password_hash(user_id, &new_hash, &now_rfc3339())
            .await?;

        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    /// Fetch a user that has not been soft-deleted.
    pub async fn get_active_user(&self, user_id: &str) -> Result<User> {
        self.db
            .get_user(user_id)
            .await?
            .filter(User::is_active)
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
    }

    pub async fn update_profile(&self, user_id: &str, patch: ProfilePatch) -> Result<User> {
        let mut user = self.get_active_user(user_id).await?;
        user.apply(patch);
        user.updated_at = now_rfc3339();
        self.db.update_profile(&user).await?;
        Ok(user)
    }

    /// Soft-delete the account; the record stays, the email is freed.
    pub async fn soft_delete(&self, user_id: &str) -> Result<()> {
        self.get_active_user(user_id).await?;
        self.db.soft_delete_user(user_id, &now_rfc3339()).await?;
        tracing::info!(user_id, "Account deleted by user");
        Ok(())
    }
}

fn check_password_len(plaintext: &str) -> Result<()> {
    let len = plaintext.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(AppError::Validation(format!(
            "password must be {MIN_PASSWORD_LEN} to {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Argon2 is CPU-bound; keep it off the async workers.
async fn hash_blocking(plaintext: String) -> Result<String> {
    let hash = tokio::task::spawn_blocking(move || password::hash_password(&plaintext))
        .await
        .map_err(anyhow::Error::from)??;
    Ok(hash)
}

async fn verify_blocking(hash: String, plaintext: String) -> Result<bool> {
    let ok = tokio::task::spawn_blocking(move || password::verify_password(&hash, &plaintext))
        .await
        .map_err(anyhow::Error::from)?;
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> CredentialService {
        CredentialService::new(Db::in_memory())
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let svc = service();
        let user = svc
            .register_local("Ada", "A@X.com ", "pw123456", Role::Mentor)
            .await
            .unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.provider, Provider::Local);

        let authed = svc.authenticate_local("a@x.com", "pw123456").await.unwrap();
        assert_eq!(authed.id, user.id);
        assert_eq!(authed.role, Role::Mentor);
        assert!(authed.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_register_rejects_privileged_roles() {
        let svc = service();
        for role in [Role::Admin, Role::Instructor] {
            let err = svc
                .register_local("Eve", "eve@x.com", "pw123456", role)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidRole(_)));
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let svc = service();
        svc.register_local("A", "a@x.com", "pw123456", Role::User)
            .await
            .unwrap();
        let err = svc
            .register_local("B", "A@x.com", "other-pass", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_authenticate_failures_are_distinct_internally() {
        let svc = service();
        svc.register_local("A", "a@x.com", "pw123456", Role::User)
            .await
            .unwrap();

        let err = svc.authenticate_local("b@x.com", "pw123456").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = svc.authenticate_local("a@x.com", "wrong-pass").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_change_password() {
        let svc = service();
        let user = svc
            .register_local("A", "a@x.com", "pw123456", Role::User)
            .await
            .unwrap();

        let err = svc
            .change_password(&user.id, "not-the-old", "new-pass-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));

        let err = svc
            .change_password(&user.id, "pw123456", "short")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        svc.change_password(&user.id, "pw123456", "new-pass-1")
            .await
            .unwrap();
        assert!(svc.authenticate_local("a@x.com", "pw123456").await.is_err());
        assert!(svc.authenticate_local("a@x.com", "new-pass-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_soft_delete_blocks_login_and_frees_email() {
        let svc = service();
        let user = svc
            .register_local("A", "a@x.com", "pw123456", Role::User)
            .await
            .unwrap();
        svc.soft_delete(&user.id).await.unwrap();

        assert!(matches!(
            svc.get_active_user(&user.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(svc.authenticate_local("a@x.com", "pw123456").await.is_err());

        let again = svc
            .register_local("A2", "a@x.com", "pw123456", Role::User)
            .await
            .unwrap();
        assert_ne!(again.id, user.id);
    }

    #[tokio::test]
    async fn test_provider_account_blocks_local_registration() {
        use crate::services::oauth::{ProviderProfile, TokenResponse};
        use crate::services::ExternalIdentityLinker;

        let db = Db::in_memory();
        let svc = CredentialService::new(db.clone());
        let profile = ProviderProfile {
            subject: "g-1".into(),
            email: "a@x.com".into(),
            name: None,
            picture: None,
        };
        let tokens = TokenResponse {
            access_token: "at".into(),
            refresh_token: None,
            expires_in: None,
        };
        ExternalIdentityLinker::new(db)
            .link(Provider::Google, &profile, &tokens)
            .await
            .unwrap();

        let err = svc
            .register_local("A", "a@x.com", "pw123456", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}

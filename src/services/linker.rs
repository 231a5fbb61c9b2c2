// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Links a verified provider profile to a local user.

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::user::{mask_email, normalize_email};
use crate::models::{ExternalIdentity, Provider, Role, User};
use crate::services::oauth::{ProviderProfile, TokenResponse};
use crate::time_utils::{expiry_from_now, format_utc_rfc3339};
use chrono::Utc;

/// Upserts users and external identities after a successful provider login.
#[derive(Clone)]
pub struct ExternalIdentityLinker {
    db: Db,
}

impl ExternalIdentityLinker {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Find or create the user for `profile`, then record the provider link.
    pub async fn link(
        &self,
        provider: Provider,
        profile: &ProviderProfile,
        tokens: &TokenResponse,
    ) -> Result<User> {
        let user = self.upsert_user(provider, profile).await?;
        self.upsert_identity(provider, &user, profile, tokens).await?;
        Ok(user)
    }

    async fn upsert_user(&self, provider: Provider, profile: &ProviderProfile) -> Result<User> {
        let email = normalize_email(&profile.email);
        let now = format_utc_rfc3339(Utc::now());

        if let Some(existing) = self.db.find_user_by_email(&email).await? {
            return self.touch_user(existing, provider, now).await;
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.clone(),
            password_hash: None,
            name: profile
                .name
                .clone()
                .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string()),
            role: Role::User,
            provider,
            position: None,
            city: None,
            income: None,
            skills: Vec::new(),
            interests: Vec::new(),
            created_at: now.clone(),
            updated_at: now.clone(),
            last_login_at: Some(now.clone()),
            deleted_at: None,
        };

        match self.db.insert_user(&user).await {
            Ok(()) => {
                tracing::info!(
                    user_id = %user.id,
                    provider = %provider,
                    email = %mask_email(&email),
                    "Created user from external login"
                );
                Ok(user)
            }
            // Lost a race with a concurrent first login for the same email.
            Err(AppError::Conflict(_)) => {
                let existing = self.db.find_user_by_email(&email).await?.ok_or_else(|| {
                    AppError::Conflict("email claimed by a concurrent login".into())
                })?;
                self.touch_user(existing, provider, now).await
            }
            Err(e) => Err(e),
        }
    }

    /// Record a login on an existing user. Local accounts keep their
    /// provider tag so the password-only-when-local invariant holds.
    async fn touch_user(&self, mut user: User, provider: Provider, now: String) -> Result<User> {
        if user.password_hash.is_none() {
            user.provider = provider;
        }
        user.last_login_at = Some(now.clone());
        user.updated_at = now;
        self.db.record_login(&user).await?;
        Ok(user)
    }

    async fn upsert_identity(
        &self,
        provider: Provider,
        user: &User,
        profile: &ProviderProfile,
        tokens: &TokenResponse,
    ) -> Result<()> {
        let now = Utc::now();
        let now_str = format_utc_rfc3339(now);
        let expires_at = expiry_from_now(now, tokens.expires_in);

        if let Some(mut identity) = self.db.get_identity(provider, &profile.subject).await? {
            if identity.user_id != user.id {
                self.reassign_identity(provider, user, &mut identity).await?;
            }
            identity.access_token = tokens.access_token.clone();
            if let Some(refresh) = &tokens.refresh_token {
                identity.refresh_token = Some(refresh.clone());
            }
            identity.expires_at = expires_at;
            identity.email = profile.email.clone();
            identity.name = profile.name.clone();
            identity.picture = profile.picture.clone();
            identity.updated_at = now_str;
            self.db.update_identity(&identity).await?;
            tracing::debug!(provider = %provider, user_id = %identity.user_id, "Refreshed external identity tokens");
            return Ok(());
        }

        self.ensure_no_other_subject(provider, user).await?;

        let identity = ExternalIdentity {
            provider,
            subject: profile.subject.clone(),
            user_id: user.id.clone(),
            email: profile.email.clone(),
            name: profile.name.clone(),
            picture: profile.picture.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at,
            created_at: now_str.clone(),
            updated_at: now_str,
        };
        self.db.insert_identity(&identity).await?;
        tracing::info!(provider = %provider, user_id = %user.id, "Linked external identity");
        Ok(())
    }

    /// Move a provider account off a soft-deleted owner onto `user`.
    ///
    /// An identity still owned by an active account is never moved.
    async fn reassign_identity(
        &self,
        provider: Provider,
        user: &User,
        identity: &mut ExternalIdentity,
    ) -> Result<()> {
        let owner_active = self
            .db
            .get_user(&identity.user_id)
            .await?
            .is_some_and(|owner| owner.is_active());
        if owner_active {
            tracing::warn!(
                provider = %provider,
                user_id = %user.id,
                owner_id = %identity.user_id,
                "Provider account is linked to another active user"
            );
            return Err(AppError::Conflict(format!(
                "{provider} account already linked to another user"
            )));
        }

        self.ensure_no_other_subject(provider, user).await?;
        tracing::info!(
            provider = %provider,
            from_user = %identity.user_id,
            to_user = %user.id,
            "Moving external identity off deleted account"
        );
        identity.user_id = user.id.clone();
        Ok(())
    }

    /// A user holds at most one subject per provider.
    async fn ensure_no_other_subject(&self, provider: Provider, user: &User) -> Result<()> {
        if let Some(other) = self.db.find_identity_for_user(&user.id, provider).await? {
            tracing::warn!(
                provider = %provider,
                user_id = %user.id,
                linked_subject = %other.subject,
                "User already linked to a different provider account"
            );
            return Err(AppError::Conflict(format!(
                "user already linked to another {provider} account"
            )));
        }
        Ok(())
    }
}

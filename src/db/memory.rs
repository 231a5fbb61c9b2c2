// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local credential store backed by `DashMap`.

use crate::error::AppError;
use crate::models::{ExternalIdentity, Provider, User};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// In-memory store. Uniqueness is enforced through `DashMap` entries, which
/// hold the shard lock for the duration of the check-and-insert.
#[derive(Default)]
pub struct MemoryDb {
    users: DashMap<String, User>,
    /// Normalized email -> user ID, for active users only.
    emails: DashMap<String, String>,
    /// `provider:subject` -> identity
    identities: DashMap<String, ExternalIdentity>,
}

impl MemoryDb {
    pub fn insert_user(&self, user: &User) -> Result<(), AppError> {
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict("email already registered".into())),
            Entry::Vacant(slot) => {
                self.users.insert(user.id.clone(), user.clone());
                slot.insert(user.id.clone());
                Ok(())
            }
        }
    }

    pub fn get_user(&self, user_id: &str) -> Option<User> {
        self.users.get(user_id).map(|u| u.value().clone())
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<User> {
        let user_id = self.emails.get(email).map(|id| id.value().clone())?;
        self.get_user(&user_id).filter(User::is_active)
    }

    pub fn record_login(&self, user: &User) -> Result<(), AppError> {
        let mut stored = self
            .users
            .get_mut(&user.id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.id)))?;
        stored.provider = user.provider;
        stored.last_login_at = user.last_login_at.clone();
        stored.updated_at = user.updated_at.clone();
        Ok(())
    }

    pub fn update_profile(&self, user: &User) -> Result<(), AppError> {
        let mut stored = self
            .users
            .get_mut(&user.id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.id)))?;
        stored.name = user.name.clone();
        stored.position = user.position.clone();
        stored.city = user.city.clone();
        stored.income = user.income;
        stored.skills = user.skills.clone();
        stored.interests = user.interests.clone();
        stored.updated_at = user.updated_at.clone();
        Ok(())
    }

    pub fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
        updated_at: &str,
    ) -> Result<(), AppError> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;
        user.password_hash = Some(password_hash.to_string());
        user.updated_at = updated_at.to_string();
        Ok(())
    }

    pub fn soft_delete_user(&self, user_id: &str, deleted_at: &str) -> Result<(), AppError> {
        let email = {
            let mut user = self
                .users
                .get_mut(user_id)
                .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;
            user.deleted_at = Some(deleted_at.to_string());
            user.updated_at = deleted_at.to_string();
            user.email.clone()
        };
        self.emails.remove_if(&email, |_, owner| owner == user_id);
        Ok(())
    }

    pub fn get_identity(&self, provider: Provider, subject: &str) -> Option<ExternalIdentity> {
        self.identities
            .get(&ExternalIdentity::key(provider, subject))
            .map(|i| i.value().clone())
    }

    pub fn find_identity_for_user(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Option<ExternalIdentity> {
        self.identities
            .iter()
            .find(|i| i.user_id == user_id && i.provider == provider)
            .map(|i| i.value().clone())
    }

    pub fn insert_identity(&self, identity: &ExternalIdentity) -> Result<(), AppError> {
        match self
            .identities
            .entry(ExternalIdentity::key(identity.provider, &identity.subject))
        {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "{} account already linked",
                identity.provider
            ))),
            Entry::Vacant(slot) => {
                slot.insert(identity.clone());
                Ok(())
            }
        }
    }

    pub fn update_identity(&self, identity: &ExternalIdentity) -> Result<(), AppError> {
        let key = ExternalIdentity::key(identity.provider, &identity.subject);
        let mut stored = self
            .identities
            .get_mut(&key)
            .ok_or_else(|| AppError::NotFound(format!("Identity {key} not found")))?;
        *stored = identity.clone();
        Ok(())
    }
}

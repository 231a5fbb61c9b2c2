// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform role carried in bearer tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Mentor,
    Instructor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Mentor => "mentor",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }

    /// Roles a caller may pick for themselves at registration.
    pub fn is_self_assignable(&self) -> bool {
        matches!(self, Role::User | Role::Mentor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "mentor" => Ok(Role::Mentor),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            other => Err(other.to_string()),
        }
    }
}

/// Where a user's credentials come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Local,
    Google,
    Linkedin,
    Youtube,
}

impl Provider {
    /// Providers reachable through the OAuth login routes.
    pub const EXTERNAL: [Provider; 3] = [Provider::Google, Provider::Linkedin, Provider::Youtube];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Google => "google",
            Provider::Linkedin => "linkedin",
            Provider::Youtube => "youtube",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Provider::Local),
            "google" => Ok(Provider::Google),
            "linkedin" => Ok(Provider::Linkedin),
            "youtube" => Ok(Provider::Youtube),
            other => Err(other.to_string()),
        }
    }
}

/// User record stored in the credential store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Opaque user ID (also used as document ID)
    pub id: String,
    /// Normalized email address
    pub email: String,
    /// Argon2 PHC string; only set for local accounts
    #[serde(default)]
    pub password_hash: Option<String>,
    pub name: String,
    pub role: Role,
    pub provider: Provider,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub income: Option<i64>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub last_login_at: Option<String>,
    /// Soft-delete marker
    #[serde(default)]
    pub deleted_at: Option<String>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Active account that can log in with a local password.
    pub fn is_local(&self) -> bool {
        self.is_active() && self.provider == Provider::Local && self.password_hash.is_some()
    }

    /// Apply a profile update in place.
    pub fn apply(&mut self, patch: ProfilePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(position) = patch.position {
            self.position = Some(position);
        }
        if let Some(city) = patch.city {
            self.city = Some(city);
        }
        if let Some(income) = patch.income {
            self.income = Some(income);
        }
        if let Some(skills) = patch.skills {
            self.skills = skills;
        }
        if let Some(interests) = patch.interests {
            self.interests = interests;
        }
    }
}

/// Partial profile update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, validator::Validate)]
pub struct ProfilePatch {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub position: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(range(min = 0))]
    pub income: Option<i64>,
    #[validate(length(max = 50))]
    pub skills: Option<Vec<String>>,
    #[validate(length(max = 50))]
    pub interests: Option<Vec<String>>,
}

/// Lowercase and trim an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Mask an email for logs: `alice@example.com` -> `a***@example.com`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().unwrap_or('*');
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("Mentor".parse::<Role>(), Ok(Role::Mentor));
        assert_eq!(" admin ".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("guru".parse::<Role>(), Err("guru".to_string()));
        assert!(Role::User.is_self_assignable());
        assert!(Role::Mentor.is_self_assignable());
        assert!(!Role::Instructor.is_self_assignable());
        assert!(!Role::Admin.is_self_assignable());
    }

    #[test]
    fn test_provider_serde_is_lowercase() {
        let json = serde_json::to_string(&Provider::Linkedin).unwrap();
        assert_eq!(json, "\"linkedin\"");
        assert_eq!("youtube".parse::<Provider>(), Ok(Provider::Youtube));
        assert!("github".parse::<Provider>().is_err());
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("alice@example.com"), "a***@example.com");
        assert_eq!(mask_email("not-an-email"), "***");
    }

    #[test]
    fn test_profile_patch_keeps_unset_fields() {
        let mut user = User {
            id: "u1".into(),
            email: "a@x.com".into(),
            password_hash: None,
            name: "Ada".into(),
            role: Role::User,
            provider: Provider::Google,
            position: Some("Engineer".into()),
            city: None,
            income: None,
            skills: vec!["rust".into()],
            interests: vec![],
            created_at: String::new(),
            updated_at: String::new(),
            last_login_at: None,
            deleted_at: None,
        };
        user.apply(ProfilePatch {
            city: Some("Lisbon".into()),
            ..Default::default()
        });
        assert_eq!(user.city.as_deref(), Some("Lisbon"));
        assert_eq!(user.position.as_deref(), Some("Engineer"));
        assert_eq!(user.skills, vec!["rust".to_string()]);
    }
}

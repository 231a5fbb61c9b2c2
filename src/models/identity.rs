// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Link between a local user and a third-party account.

use super::Provider;
use serde::{Deserialize, Serialize};

/// External identity stored alongside the user it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub provider: Provider,
    /// Provider-assigned subject ID
    pub subject: String,
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// When the access token expires (RFC 3339)
    #[serde(default)]
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ExternalIdentity {
    /// Storage key, unique per provider account.
    pub fn key(provider: Provider, subject: &str) -> String {
        format!("{}:{}", provider, subject)
    }
}

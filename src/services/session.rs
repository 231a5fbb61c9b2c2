// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Legacy cookie-backed sessions.
//!
//! Bearer tokens are the primary mechanism. Sessions remain for browser
//! flows that finish an OAuth login and expect a cookie; the access
//! middleware consults them only when no `Authorization` header is sent.

use crate::models::{Role, User};
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;

/// Cookie carrying the session ID.
pub const SESSION_COOKIE: &str = "pathway_session";

/// How long a session lives after login.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Server-side session state.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session map shared by all request handlers.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
}

impl SessionStore {
    /// Start a session for `user`.
    pub fn create(&self, user: &User) -> anyhow::Result<Session> {
        let session = Session {
            id: random_token(32)?,
            user_id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            expires_at: Utc::now() + Duration::hours(SESSION_TTL_HOURS),
        };
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    /// Look up a live session; an expired one is evicted and not returned.
    pub fn get(&self, id: &str) -> Option<Session> {
        self.get_at(id, Utc::now())
    }

    pub fn get_at(&self, id: &str, now: DateTime<Utc>) -> Option<Session> {
        let session = self.sessions.get(id).map(|s| s.value().clone())?;
        if session.is_expired(now) {
            self.sessions.remove(id);
            return None;
        }
        Some(session)
    }

    pub fn destroy(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Drop every session belonging to `user_id`.
    pub fn destroy_for_user(&self, user_id: &str) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.user_id != user_id);
        before.saturating_sub(self.sessions.len())
    }

    /// Drop expired sessions; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// `len` random bytes from the system CSPRNG, base64url encoded.
pub fn random_token(len: usize) -> anyhow::Result<String> {
    let mut bytes = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| anyhow::anyhow!("system random source unavailable"))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Cookie that carries a freshly created session.
pub fn session_cookie(session_id: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::hours(SESSION_TTL_HOURS))
        .build()
}

/// Cookie template passed to `CookieJar::remove`; attributes must match
/// the ones used at creation for browsers to drop it.
pub fn session_removal_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

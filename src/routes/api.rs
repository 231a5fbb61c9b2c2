// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{ProfilePatch, Provider, Role, User};
use crate::services::session::session_removal_cookie;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// API routes (require authentication via bearer token or session).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/profile", get(get_profile).put(update_profile))
        .route("/api/password", put(change_password))
        .route("/api/logout", post(logout))
        .route("/api/account", delete(delete_account))
        .route("/api/admin/users/{user_id}", get(admin_get_user))
}

// ─── User Profile ────────────────────────────────────────────

/// Public view of a user; never carries the password hash.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub provider: Provider,
    pub position: Option<String>,
    pub city: Option<String>,
    pub income: Option<i64>,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            provider: user.provider,
            position: user.position,
            city: user.city,
            income: user.income,
            skills: user.skills,
            interests: user.interests,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

/// Get current user profile.
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state.credentials.get_active_user(&user.user_id).await?;
    Ok(Json(profile.into()))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<ProfilePatch>, JsonRejection>,
) -> Result<Json<UserResponse>> {
    let Json(patch) = payload?;
    patch.validate()?;
    let profile = state.credentials.update_profile(&user.user_id, patch).await?;
    Ok(Json(profile.into()))
}

// ─── Credentials ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(body) = payload?;
    state
        .credentials
        .change_password(&user.user_id, &body.old_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Session ─────────────────────────────────────────────────

/// End the caller's session.
///
/// Bearer tokens cannot be revoked; the client discards its copy. A legacy
/// session is destroyed and its cookie cleared.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> (CookieJar, StatusCode) {
    if let Some(session_id) = &user.session_id {
        state.sessions.destroy(session_id);
    } else if let Some(cookie) = jar.get(crate::services::session::SESSION_COOKIE) {
        state.sessions.destroy(cookie.value());
    }
    tracing::info!(user_id = %user.user_id, "User logged out");

    let jar = jar.remove(session_removal_cookie(state.config.secure_cookies()));
    (jar, StatusCode::NO_CONTENT)
}

// ─── Account Deletion ────────────────────────────────────────

/// Soft-delete the caller's account and end its sessions.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode)> {
    state.credentials.soft_delete(&user.user_id).await?;
    let dropped = state.sessions.destroy_for_user(&user.user_id);
    tracing::info!(user_id = %user.user_id, sessions = dropped, "Account deleted");

    let jar = jar.remove(session_removal_cookie(state.config.secure_cookies()));
    Ok((jar, StatusCode::NO_CONTENT))
}

// ─── Admin ───────────────────────────────────────────────────

async fn admin_get_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>> {
    caller.require_role(&[Role::Admin])?;
    let user = state.credentials.get_active_user(&user_id).await?;
    Ok(Json(user.into()))
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer-token authentication middleware.

use crate::error::AppError;
use crate::models::Role;
use crate::services::session::SESSION_COOKIE;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Authenticated caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    /// Set when the caller came in through the legacy session cookie.
    pub session_id: Option<String>,
}

impl AuthUser {
    /// Fail with `PermissionDenied` unless the caller holds one of `allowed`.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.user_id,
                role = %self.role,
                "Role check failed"
            );
            Err(AppError::PermissionDenied)
        }
    }
}

/// Middleware that requires a valid bearer token (or a legacy session).
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = authenticate(&state, request.headers(), &jar)?;
    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Resolve the caller from the `Authorization` header, falling back to the
/// session cookie only when no header was sent.
pub fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> Result<AuthUser, AppError> {
    match bearer_token(headers) {
        Ok(token) => {
            let claims = state.tokens.verify(token)?;
            Ok(AuthUser {
                user_id: claims.user_id,
                email: claims.email,
                role: claims.role,
                session_id: None,
            })
        }
        Err(AppError::MissingAuthorization) => {
            let Some(cookie) = jar.get(SESSION_COOKIE) else {
                return Err(AppError::MissingAuthorization);
            };
            let session = state
                .sessions
                .get(cookie.value())
                .ok_or(AppError::InvalidToken)?;
            Ok(AuthUser {
                user_id: session.user_id,
                email: session.email,
                role: session.role,
                session_id: Some(session.id),
            })
        }
        Err(e) => Err(e),
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AppError::MissingAuthorization)?
        .to_str()
        .map_err(|_| AppError::InvalidToken)?;

    match value.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AppError::InvalidToken),
    }
}

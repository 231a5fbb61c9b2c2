// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local account registration and password login.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::user::mask_email;
use crate::models::Role;
use crate::routes::api::UserResponse;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Registration request body.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Display name; defaults to the local part of the email
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    /// `user` (default) or `mentor`
    #[serde(default)]
    pub role: Option<String>,
}

/// Create a local account.
async fn register(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let Json(body) = payload?;
    body.validate()?;

    let role = match body.role.as_deref() {
        None => Role::User,
        Some(raw) => raw.parse::<Role>().map_err(AppError::InvalidRole)?,
    };

    let name = match body.name {
        Some(name) => name,
        None => body.email.split('@').next().unwrap_or_default().to_string(),
    };

    let user = state
        .credentials
        .register_local(&name, &body.email, &body.password, role)
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Exchange an email and password for a bearer token.
async fn login(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(body) = payload?;
    body.validate()?;

    let user = match state
        .credentials
        .authenticate_local(&body.email, &body.password)
        .await
    {
        Ok(user) => user,
        // Unknown email and wrong password look the same to the caller.
        Err(AppError::NotFound(_)) | Err(AppError::InvalidCredentials) => {
            tracing::info!(email = %mask_email(&body.email), "Local login failed");
            return Err(AppError::InvalidCredentials);
        }
        Err(e) => return Err(e),
    };

    let token = state.tokens.issue(&user.id, &user.email, user.role)?;
    tracing::info!(user_id = %user.id, "Local login succeeded");

    Ok(Json(LoginResponse { token }))
}

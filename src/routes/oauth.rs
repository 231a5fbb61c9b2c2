// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! External provider (Google, LinkedIn, YouTube) sign-in routes.
//!
//! Browser-facing: every failure after the provider check ends in a
//! redirect to the frontend login page, never in a JSON error.

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::models::{Provider, User};
use crate::services::oauth::{sign_state, verify_state};
use crate::services::session::session_cookie;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login/{provider}", get(oauth_start))
        .route("/callback/{provider}", get(oauth_callback))
}

/// Resolve a path segment to an enabled external provider.
fn enabled_provider<'a>(state: &'a AppState, raw: &str) -> Result<(Provider, &'a ProviderConfig)> {
    let provider = raw
        .parse::<Provider>()
        .ok()
        .filter(|p| *p != Provider::Local)
        .ok_or_else(|| AppError::NotFound(format!("Unknown provider {raw}")))?;
    let cfg = state
        .config
        .provider(provider)
        .ok_or_else(|| AppError::NotFound(format!("Provider {provider} is not enabled")))?;
    Ok((provider, cfg))
}

/// Start OAuth flow - redirect to the provider's consent page.
async fn oauth_start(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Redirect> {
    let (provider, cfg) = enabled_provider(&state, &provider)?;

    let oauth_state = sign_state(provider, &state.config.oauth_state_key, Utc::now())?;
    let auth_url = state.oauth.authorize_url(provider, cfg, &oauth_state);

    tracing::info!(provider = %provider, "Starting OAuth flow");
    Ok(Redirect::temporary(&auth_url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Why a callback was abandoned. Only the code reaches the browser.
#[derive(Debug)]
enum CallbackFailure {
    StateMismatch,
    ProviderDenied(String),
    MissingCode,
    Exchange(AppError),
    Profile(AppError),
    Link(AppError),
    Session(AppError),
}

impl CallbackFailure {
    fn code(&self) -> &'static str {
        match self {
            CallbackFailure::StateMismatch => "state_mismatch",
            CallbackFailure::ProviderDenied(_) => "access_denied",
            CallbackFailure::MissingCode => "missing_code",
            CallbackFailure::Exchange(_) => "exchange_failed",
            CallbackFailure::Profile(_) => "profile_failed",
            CallbackFailure::Link(_) => "link_failed",
            CallbackFailure::Session(_) => "session_failed",
        }
    }
}

/// OAuth callback - verify state, exchange code, link accounts, start session.
async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let (provider, cfg) = enabled_provider(&state, &provider)?;

    let user = match complete_login(&state, provider, cfg, params).await {
        Ok(user) => user,
        Err(failure) => {
            tracing::warn!(provider = %provider, reason = ?failure, "OAuth login aborted");
            return Ok((jar, failure_redirect(&state, failure.code())));
        }
    };

    match establish(&state, &user) {
        Ok((token, session_id)) => {
            tracing::info!(provider = %provider, user_id = %user.id, "OAuth login succeeded");
            let jar = jar.add(session_cookie(session_id, state.config.secure_cookies()));
            let welcome = format!("{}/welcome#token={}", state.config.frontend_url, token);
            Ok((jar, Redirect::temporary(&welcome)))
        }
        Err(e) => {
            let failure = CallbackFailure::Session(e);
            tracing::error!(provider = %provider, reason = ?failure, "OAuth login aborted");
            Ok((jar, failure_redirect(&state, failure.code())))
        }
    }
}

/// Steps 2-6 of the flow: nothing is written until state and code check out.
async fn complete_login(
    state: &AppState,
    provider: Provider,
    cfg: &ProviderConfig,
    params: CallbackParams,
) -> std::result::Result<User, CallbackFailure> {
    let returned_state = params.state.unwrap_or_default();
    if !verify_state(
        &returned_state,
        provider,
        &state.config.oauth_state_key,
        Utc::now(),
    ) {
        return Err(CallbackFailure::StateMismatch);
    }

    if let Some(error) = params.error {
        return Err(CallbackFailure::ProviderDenied(error));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(CallbackFailure::MissingCode)?;

    let tokens = state
        .oauth
        .exchange_code(provider, cfg, &code)
        .await
        .map_err(CallbackFailure::Exchange)?;

    let profile = state
        .oauth
        .fetch_profile(provider, cfg, &tokens.access_token)
        .await
        .map_err(CallbackFailure::Profile)?;

    state
        .linker
        .link(provider, &profile, &tokens)
        .await
        .map_err(CallbackFailure::Link)
}

/// Mint the bearer token and the legacy session for a linked user.
fn establish(state: &AppState, user: &User) -> Result<(String, String)> {
    let token = state.tokens.issue(&user.id, &user.email, user.role)?;
    let session = state.sessions.create(user)?;
    Ok((token, session.id))
}

fn failure_redirect(state: &AppState, code: &str) -> Redirect {
    Redirect::temporary(&format!(
        "{}/login?error={}",
        state.config.frontend_url,
        urlencoding::encode(code)
    ))
}

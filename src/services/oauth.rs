// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth2 authorization-code client for Google, LinkedIn and YouTube.
//!
//! Handles:
//! - Authorization URL construction with a signed `state`
//! - Code-for-token exchange
//! - Typed user-info decoding (missing or mistyped fields fail the login)

use crate::config::ProviderConfig;
use crate::error::AppError;
use crate::models::Provider;
use anyhow::Context;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// How long a `state` value stays acceptable after the redirect.
pub const OAUTH_STATE_MAX_AGE_SECS: i64 = 10 * 60;

const YOUTUBE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/youtube.readonly";

/// Scopes requested from each provider.
pub fn scopes(provider: Provider) -> Vec<&'static str> {
    match provider {
        Provider::Google => vec!["openid", "email", "profile"],
        Provider::Linkedin => vec!["openid", "profile", "email"],
        Provider::Youtube => vec!["openid", "email", "profile", YOUTUBE_READONLY_SCOPE],
        Provider::Local => vec![],
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Provider profile reduced to what account linking needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Google OpenID Connect user-info (also used for YouTube logins).
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: String,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// LinkedIn "Sign In with LinkedIn using OpenID Connect" user-info.
#[derive(Debug, Deserialize)]
struct LinkedinUserInfo {
    sub: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

impl From<GoogleUserInfo> for ProviderProfile {
    fn from(info: GoogleUserInfo) -> Self {
        Self {
            subject: info.sub,
            email: info.email,
            name: info.name,
            picture: info.picture,
        }
    }
}

impl From<LinkedinUserInfo> for ProviderProfile {
    fn from(info: LinkedinUserInfo) -> Self {
        let name = info.name.or_else(|| {
            let joined = [info.given_name, info.family_name]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            (!joined.is_empty()).then_some(joined)
        });
        Self {
            subject: info.sub,
            email: info.email,
            name,
            picture: info.picture,
        }
    }
}

/// Decode a provider user-info payload.
///
/// Accounts are matched by email, so a profile whose provider reports the
/// address as unverified is refused.
pub fn parse_profile(provider: Provider, body: &[u8]) -> Result<ProviderProfile, AppError> {
    let malformed =
        |e: serde_json::Error| AppError::Upstream(format!("malformed {provider} profile: {e}"));

    let (profile, email_verified): (ProviderProfile, Option<bool>) = match provider {
        Provider::Google | Provider::Youtube => {
            let info: GoogleUserInfo = serde_json::from_slice(body).map_err(malformed)?;
            let verified = info.email_verified;
            (info.into(), verified)
        }
        Provider::Linkedin => {
            let info: LinkedinUserInfo = serde_json::from_slice(body).map_err(malformed)?;
            let verified = info.email_verified;
            (info.into(), verified)
        }
        Provider::Local => {
            return Err(AppError::Upstream("local provider has no profile".into()));
        }
    };

    if profile.subject.trim().is_empty() || !profile.email.contains('@') {
        return Err(AppError::Upstream(format!(
            "{provider} profile missing subject or email"
        )));
    }
    if email_verified == Some(false) {
        return Err(AppError::Upstream(format!(
            "{provider} reports the account email as unverified"
        )));
    }
    Ok(profile)
}

/// HTTP client for the provider endpoints, with a bounded timeout.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building OAuth HTTP client")?;
        Ok(Self { http })
    }

    /// URL the browser is sent to for consent.
    pub fn authorize_url(&self, provider: Provider, cfg: &ProviderConfig, state: &str) -> String {
        let mut url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            cfg.auth_url,
            urlencoding::encode(&cfg.client_id),
            urlencoding::encode(&cfg.redirect_url),
            urlencoding::encode(&scopes(provider).join(" ")),
            urlencoding::encode(state),
        );
        if matches!(provider, Provider::Google | Provider::Youtube) {
            // Google only returns a refresh token for offline access.
            url.push_str("&access_type=offline&prompt=consent");
        }
        url
    }

    /// Exchange an authorization code for provider tokens.
    pub async fn exchange_code(
        &self,
        provider: Provider,
        cfg: &ProviderConfig,
        code: &str,
    ) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&cfg.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", cfg.redirect_url.as_str()),
                ("client_id", cfg.client_id.as_str()),
                ("client_secret", cfg.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("{provider} token request failed: {e}")))?;

        let body = check_response(provider, response).await?;
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Upstream(format!("malformed {provider} token response: {e}")))
    }

    /// Fetch the signed-in account's profile with a fresh access token.
    pub async fn fetch_profile(
        &self,
        provider: Provider,
        cfg: &ProviderConfig,
        access_token: &str,
    ) -> Result<ProviderProfile, AppError> {
        let response = self
            .http
            .get(&cfg.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("{provider} profile request failed: {e}")))?;

        let body = check_response(provider, response).await?;
        parse_profile(provider, &body)
    }
}

/// Return the body of a successful response, or an upstream error.
async fn check_response(
    provider: Provider,
    response: reqwest::Response,
) -> Result<Vec<u8>, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(provider = %provider, status = %status, body_len = body.len(), "Provider returned error");
        tracing::debug!(provider = %provider, excerpt = %log_excerpt(&body), "Provider error body");
        return Err(AppError::Upstream(format!("{provider} returned HTTP {status}")));
    }
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| AppError::Upstream(format!("{provider} response read failed: {e}")))
}

/// Longest slice of a provider error body that reaches the logs.
const MAX_LOGGED_BODY_CHARS: usize = 120;

/// Provider error bodies can echo codes or tokens; keep only a short prefix.
fn log_excerpt(body: &str) -> String {
    let mut chars = body.chars();
    let excerpt: String = chars.by_ref().take(MAX_LOGGED_BODY_CHARS).collect();
    if chars.next().is_some() {
        format!("{excerpt}…")
    } else {
        excerpt
    }
}

// ─── Anti-forgery state ─────────────────────────────────────────────────────

/// Build a signed `state`: base64url("provider|issued_at_hex|hmac_hex").
pub fn sign_state(provider: Provider, key: &[u8], now: DateTime<Utc>) -> anyhow::Result<String> {
    let payload = format!("{}|{:x}", provider, now.timestamp());
    let signature = state_signature(&payload, key)?;
    Ok(URL_SAFE_NO_PAD.encode(format!("{payload}|{signature}")))
}

/// Check a returned `state` was issued by us, for this provider, recently.
pub fn verify_state(state: &str, provider: Provider, key: &[u8], now: DateTime<Utc>) -> bool {
    let Some(decoded) = URL_SAFE_NO_PAD
        .decode(state)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    else {
        return false;
    };

    let parts: Vec<&str> = decoded.splitn(3, '|').collect();
    let &[state_provider, issued_hex, signature] = parts.as_slice() else {
        return false;
    };

    let payload = format!("{state_provider}|{issued_hex}");
    let Ok(expected) = state_signature(&payload, key) else {
        return false;
    };
    if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return false;
    }

    if state_provider != provider.as_str() {
        tracing::warn!(expected = %provider, got = state_provider, "OAuth state issued for another provider");
        return false;
    }

    let Ok(issued_at) = i64::from_str_radix(issued_hex, 16) else {
        return false;
    };
    let age = now.timestamp() - issued_at;
    (0..=OAUTH_STATE_MAX_AGE_SECS).contains(&age)
}

fn state_signature(payload: &str, key: &[u8]) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(key).context("HMAC init failed")?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const KEY: &[u8] = b"state_key";

    #[test]
    fn test_state_roundtrip() {
        let now = Utc::now();
        let state = sign_state(Provider::Google, KEY, now).unwrap();
        assert!(verify_state(&state, Provider::Google, KEY, now));
        assert!(!state.contains('+') && !state.contains('/') && !state.contains('='));
    }

    #[test]
    fn test_state_rejects_wrong_key_provider_and_age() {
        let now = Utc::now();
        let state = sign_state(Provider::Linkedin, KEY, now).unwrap();

        assert!(!verify_state(&state, Provider::Linkedin, b"other_key", now));
        assert!(!verify_state(&state, Provider::Google, KEY, now));
        let stale = now + ChronoDuration::seconds(OAUTH_STATE_MAX_AGE_SECS + 1);
        assert!(!verify_state(&state, Provider::Linkedin, KEY, stale));
        let backdated = now - ChronoDuration::seconds(5);
        assert!(!verify_state(&state, Provider::Linkedin, KEY, backdated));
    }

    #[test]
    fn test_state_rejects_garbage() {
        let now = Utc::now();
        assert!(!verify_state("", Provider::Google, KEY, now));
        assert!(!verify_state("not-valid-base64!!!", Provider::Google, KEY, now));
        let two_parts = URL_SAFE_NO_PAD.encode("google|abc");
        assert!(!verify_state(&two_parts, Provider::Google, KEY, now));
        let forged = URL_SAFE_NO_PAD.encode(format!("google|{:x}|deadbeef", now.timestamp()));
        assert!(!verify_state(&forged, Provider::Google, KEY, now));
    }

    #[test]
    fn test_parse_google_profile() {
        let body = br#"{"sub":"1234","email":"ada@gmail.com","email_verified":true,"name":"Ada L","picture":"https://p/1.png"}"#;
        let profile = parse_profile(Provider::Google, body).unwrap();
        assert_eq!(profile.subject, "1234");
        assert_eq!(profile.email, "ada@gmail.com");
        assert_eq!(profile.name.as_deref(), Some("Ada L"));
    }

    #[test]
    fn test_parse_linkedin_profile_builds_name() {
        let body = br#"{"sub":"li-9","email":"ada@li.com","given_name":"Ada","family_name":"Lovelace"}"#;
        let profile = parse_profile(Provider::Linkedin, body).unwrap();
        assert_eq!(profile.name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_parse_profile_rejects_missing_or_mistyped_fields() {
        let missing_email = br#"{"sub":"1234","name":"Ada"}"#;
        assert!(matches!(
            parse_profile(Provider::Google, missing_email),
            Err(AppError::Upstream(_))
        ));

        let numeric_sub = br#"{"sub":1234,"email":"a@x.com"}"#;
        assert!(parse_profile(Provider::Youtube, numeric_sub).is_err());

        let empty_email = br#"{"sub":"1","email":""}"#;
        assert!(parse_profile(Provider::Linkedin, empty_email).is_err());
    }

    #[test]
    fn test_parse_profile_rejects_unverified_email() {
        let google = br#"{"sub":"attacker","email":"victim@x.com","email_verified":false}"#;
        assert!(matches!(
            parse_profile(Provider::Google, google),
            Err(AppError::Upstream(_))
        ));
        assert!(parse_profile(Provider::Youtube, google).is_err());

        let linkedin = br#"{"sub":"li-1","email":"victim@x.com","email_verified":false}"#;
        assert!(matches!(
            parse_profile(Provider::Linkedin, linkedin),
            Err(AppError::Upstream(_))
        ));

        let verified = br#"{"sub":"li-1","email":"ok@x.com","email_verified":true}"#;
        assert!(parse_profile(Provider::Linkedin, verified).is_ok());
    }

    #[test]
    fn test_log_excerpt_truncates_long_bodies() {
        assert_eq!(log_excerpt(r#"{"error":"invalid_grant"}"#), r#"{"error":"invalid_grant"}"#);

        let long = "é".repeat(MAX_LOGGED_BODY_CHARS * 3);
        let excerpt = log_excerpt(&long);
        assert_eq!(excerpt.chars().count(), MAX_LOGGED_BODY_CHARS + 1);
        assert!(excerpt.ends_with('…'));
    }

    #[test]
    fn test_authorize_url_contents() {
        let cfg = ProviderConfig::new(
            Provider::Youtube,
            "client id",
            "secret",
            "http://localhost:8080/callback/youtube",
        );
        let client = OAuthClient::new(Duration::from_secs(1)).unwrap();
        let url = client.authorize_url(Provider::Youtube, &cfg, "st8");

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcallback%2Fyoutube"));
        assert!(url.contains("youtube.readonly"));
        assert!(url.contains("state=st8"));
        assert!(url.contains("access_type=offline"));
        assert!(!url.contains("client_secret"));
    }
}

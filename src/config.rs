// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup and handed to components through
//! `AppState`; nothing here is mutated afterwards.

use crate::models::Provider;
use std::env;
use std::time::Duration;

/// Minimum accepted length of the JWT signing key, in bytes.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// Minimum accepted length of the OAuth `state` HMAC key, in bytes.
pub const MIN_STATE_KEY_LEN: usize = 32;

/// Default timeout for calls to external identity providers.
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Where user records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// Firestore in the given GCP project (`firestore://<project>`).
    Firestore { project_id: String },
    /// Process-local store (`memory://`), used for development and tests.
    Memory,
}

impl DatabaseUrl {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw == "memory://" || raw == "memory" {
            return Ok(Self::Memory);
        }
        match raw.strip_prefix("firestore://") {
            Some(project) if !project.is_empty() => Ok(Self::Firestore {
                project_id: project.trim_end_matches('/').to_string(),
            }),
            _ => Err(ConfigError::Invalid {
                var: "DATABASE_URL",
                reason: format!("unsupported database url '{raw}'"),
            }),
        }
    }
}

/// OAuth client registration for one external identity provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Callback URL registered with the provider (points at `/callback/{provider}`).
    pub redirect_url: String,
    /// Authorization endpoint the browser is redirected to.
    pub auth_url: String,
    /// Token endpoint for the authorization-code exchange.
    pub token_url: String,
    /// User-info endpoint queried with the fresh access token.
    pub userinfo_url: String,
}

impl ProviderConfig {
    /// Build a config for `provider` pointing at its public endpoints.
    pub fn new(
        provider: Provider,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        let (auth_url, token_url, userinfo_url) = match provider {
            Provider::Google | Provider::Youtube => (
                "https://accounts.google.com/o/oauth2/v2/auth",
                "https://oauth2.googleapis.com/token",
                "https://openidconnect.googleapis.com/v1/userinfo",
            ),
            Provider::Linkedin => (
                "https://www.linkedin.com/oauth/v2/authorization",
                "https://www.linkedin.com/oauth/v2/accessToken",
                "https://api.linkedin.com/v2/userinfo",
            ),
            Provider::Local => ("", "", ""),
        };
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: redirect_url.into(),
            auth_url: auth_url.to_string(),
            token_url: token_url.to_string(),
            userinfo_url: userinfo_url.to_string(),
        }
    }

    /// Point every provider endpoint at `base` (a fake provider in tests).
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.auth_url = format!("{base}/authorize");
        self.token_url = format!("{base}/token");
        self.userinfo_url = format!("{base}/userinfo");
        self
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Frontend URL used for CORS and post-login redirects
    pub frontend_url: String,
    /// Backing store
    pub database: DatabaseUrl,
    /// HS256 key for bearer tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
    pub google: Option<ProviderConfig>,
    pub linkedin: Option<ProviderConfig>,
    pub youtube: Option<ProviderConfig>,
    /// Upper bound on every call to an external identity provider
    pub provider_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honoured for local development. Missing secrets or a
    /// half-configured provider abort startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let jwt_signing_key = env::var("JWT_SIGNING_KEY")
            .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
            .into_bytes();
        if jwt_signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(ConfigError::Invalid {
                var: "JWT_SIGNING_KEY",
                reason: format!("must be at least {MIN_SIGNING_KEY_LEN} bytes"),
            });
        }

        let oauth_state_key = env::var("OAUTH_STATE_KEY")
            .map(|v| v.trim().to_string())
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("OAUTH_STATE_KEY"))?
            .into_bytes();
        if oauth_state_key.len() < MIN_STATE_KEY_LEN {
            return Err(ConfigError::Invalid {
                var: "OAUTH_STATE_KEY",
                reason: format!("must be at least {MIN_STATE_KEY_LEN} bytes"),
            });
        }

        let database =
            DatabaseUrl::parse(&env::var("DATABASE_URL").unwrap_or_else(|_| "memory://".into()))?;

        let provider_timeout = match env::var("PROVIDER_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(raw.trim().parse().map_err(|_| {
                ConfigError::Invalid {
                    var: "PROVIDER_TIMEOUT_SECS",
                    reason: format!("'{raw}' is not a number of seconds"),
                }
            })?),
            Err(_) => Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
        };

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            database,
            jwt_signing_key,
            oauth_state_key,
            google: provider_from_env(Provider::Google, "GOOGLE")?,
            linkedin: provider_from_env(Provider::Linkedin, "LINKEDIN")?,
            youtube: provider_from_env(Provider::Youtube, "YOUTUBE")?,
            provider_timeout,
        })
    }

    /// Config for tests: in-memory store, fixed keys, no providers.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            database: DatabaseUrl::Memory,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key_32_bytes!!!!".to_vec(),
            google: None,
            linkedin: None,
            youtube: None,
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }

    /// OAuth registration for `provider`, if that provider is enabled.
    pub fn provider(&self, provider: Provider) -> Option<&ProviderConfig> {
        match provider {
            Provider::Google => self.google.as_ref(),
            Provider::Linkedin => self.linkedin.as_ref(),
            Provider::Youtube => self.youtube.as_ref(),
            Provider::Local => None,
        }
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.frontend_url.starts_with("https://")
    }
}

/// Read `{PREFIX}_CLIENT_ID`, `{PREFIX}_CLIENT_SECRET` and `{PREFIX}_REDIRECT_URL`.
///
/// All three absent disables the provider; a partial set is an error.
fn provider_from_env(
    provider: Provider,
    prefix: &'static str,
) -> Result<Option<ProviderConfig>, ConfigError> {
    let read = |suffix: &str| {
        env::var(format!("{prefix}_{suffix}"))
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    match (read("CLIENT_ID"), read("CLIENT_SECRET"), read("REDIRECT_URL")) {
        (Some(id), Some(secret), Some(redirect)) => {
            Ok(Some(ProviderConfig::new(provider, id, secret, redirect)))
        }
        (None, None, None) => {
            tracing::warn!(provider = %provider, "Provider not configured, login routes disabled");
            Ok(None)
        }
        _ => Err(ConfigError::Incomplete(prefix)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("Incomplete OAuth configuration for {0}: CLIENT_ID, CLIENT_SECRET and REDIRECT_URL are all required")]
    Incomplete(&'static str),
}

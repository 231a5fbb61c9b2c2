// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Pathway API: accounts and sign-in for the career-development platform.
//!
//! This crate provides local password accounts, Google/LinkedIn/YouTube
//! sign-in, bearer tokens and the access middleware that guards the
//! user-facing API.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Db;
use services::{CredentialService, ExternalIdentityLinker, OAuthClient, SessionStore, TokenIssuer};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub credentials: CredentialService,
    pub tokens: TokenIssuer,
    pub sessions: SessionStore,
    pub oauth: OAuthClient,
    pub linker: ExternalIdentityLinker,
}

impl AppState {
    /// Wire every service to `db` and the secrets in `config`.
    pub fn new(config: Config, db: Db) -> anyhow::Result<Self> {
        Ok(Self {
            credentials: CredentialService::new(db.clone()),
            tokens: TokenIssuer::new(&config.jwt_signing_key),
            sessions: SessionStore::default(),
            oauth: OAuthClient::new(config.provider_timeout)?,
            linker: ExternalIdentityLinker::new(db.clone()),
            config,
            db,
        })
    }
}

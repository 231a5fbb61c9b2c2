// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod credentials;
pub mod linker;
pub mod oauth;
pub mod password;
pub mod session;
pub mod token;

pub use credentials::CredentialService;
pub use linker::ExternalIdentityLinker;
pub use oauth::{OAuthClient, ProviderProfile, TokenResponse};
pub use session::{Session, SessionStore};
pub use token::{Claims, TokenError, TokenIssuer};

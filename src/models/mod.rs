// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod identity;
pub mod user;

pub use identity::ExternalIdentity;
pub use user::{Provider, ProfilePatch, Role, User};

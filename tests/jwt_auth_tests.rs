// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer token tests against the full router.

use axum::http::StatusCode;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use pathway_api::models::Role;
use pathway_api::services::{Claims, TokenIssuer};

mod common;
use common::{body_json, get_request, register_and_login, send};

/// Decode the payload segment without verifying the signature.
fn raw_claims(token: &str) -> serde_json::Value {
    let payload = token.split('.').nth(1).unwrap();
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
}

#[tokio::test]
async fn test_login_token_claims() {
    let (app, _state) = common::create_test_app();
    let before = Utc::now().timestamp();
    let token = register_and_login(&app, "claims@example.com", "password123", "mentor").await;
    let after = Utc::now().timestamp();

    let claims = raw_claims(&token);
    assert_eq!(claims["email"], "claims@example.com");
    assert_eq!(claims["role"], "mentor");
    assert!(claims["userID"].is_string());
    assert!(claims.get("user_id").is_none());

    let exp = claims["exp"].as_i64().unwrap();
    assert!(exp >= before + 24 * 3600);
    assert!(exp <= after + 24 * 3600);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let (app, state) = common::create_test_app();
    let token = state
        .tokens
        .issue_at(
            "user-1",
            "late@example.com",
            Role::User,
            Utc::now() - Duration::hours(25),
        )
        .unwrap();

    let response = send(&app, get_request("/api/profile", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "invalid_token");
}

#[tokio::test]
async fn test_token_signed_with_other_key_rejected() {
    let (app, _state) = common::create_test_app();
    let forged = TokenIssuer::new(b"some_other_key_that_is_32_bytes!")
        .issue("user-1", "forged@example.com", Role::Admin)
        .unwrap();

    let response = send(&app, get_request("/api/profile", Some(&forged))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_with_other_algorithm_rejected() {
    let (app, state) = common::create_test_app();
    let claims = Claims {
        email: "alg@example.com".to_string(),
        role: Role::User,
        user_id: "user-1".to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp(),
    };
    let token = encode(
        &Header::new(Algorithm::HS384),
        &claims,
        &EncodingKey::from_secret(&state.config.jwt_signing_key),
    )
    .unwrap();

    let response = send(&app, get_request("/api/profile", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tampered_payload_rejected() {
    let (app, _state) = common::create_test_app();
    let token = register_and_login(&app, "tamper@example.com", "password123", "user").await;

    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    let mut claims = raw_claims(&token);
    claims["role"] = "admin".into();
    parts[1] = URL_SAFE_NO_PAD.encode(claims.to_string());
    let tampered = parts.join(".");

    let response = send(&app, get_request("/api/profile", Some(&tampered))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

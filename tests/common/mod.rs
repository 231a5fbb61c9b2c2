// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use pathway_api::config::{Config, ProviderConfig};
use pathway_api::db::Db;
use pathway_api::models::Provider;
use pathway_api::routes::create_router;
use pathway_api::AppState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test app on the in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    create_test_app_with_config(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config, Db::in_memory()).expect("state should build"));
    (create_router(state.clone()), state)
}

/// Send one request through a clone of the router.
#[allow(dead_code)]
pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

#[allow(dead_code)]
pub fn json_request(
    method: &str,
    uri: &str,
    body: serde_json::Value,
    token: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[allow(dead_code)]
pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Register a local account and return a bearer token for it.
#[allow(dead_code)]
pub async fn register_and_login(app: &Router, email: &str, password: &str, role: &str) -> String {
    let response = send(
        app,
        json_request(
            "POST",
            "/register",
            serde_json::json!({"name": "Test User", "email": email, "password": password, "role": role}),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(
        app,
        json_request(
            "POST",
            "/login",
            serde_json::json!({"email": email, "password": password}),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string()
}

#[allow(dead_code)]
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect should carry a Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// Value of query parameter `name` in `url`, URL-decoded.
#[allow(dead_code)]
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| urlencoding::decode(value).unwrap().into_owned())
    })
}

// ─── Fake OAuth provider ─────────────────────────────────────────────────────

pub const FAKE_CODE: &str = "good-code";
pub const FAKE_ACCESS_TOKEN: &str = "fake-access-token";

/// Behaviour and counters of a fake provider.
#[allow(dead_code)]
pub struct FakeProvider {
    pub base_url: String,
    pub token_calls: Arc<AtomicUsize>,
    pub userinfo_calls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FakeProvider {
    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn userinfo_calls(&self) -> usize {
        self.userinfo_calls.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct FakeState {
    profile: serde_json::Value,
    token_delay: Duration,
    token_calls: Arc<AtomicUsize>,
    userinfo_calls: Arc<AtomicUsize>,
}

async fn fake_token(
    State(fake): State<FakeState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    fake.token_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(fake.token_delay).await;

    if form.get("grant_type").map(String::as_str) != Some("authorization_code")
        || form.get("code").map(String::as_str) != Some(FAKE_CODE)
        || form.get("client_secret").map(String::as_str) != Some("test-secret")
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "invalid_grant"})),
        )
            .into_response();
    }

    Json(serde_json::json!({
        "access_token": FAKE_ACCESS_TOKEN,
        "refresh_token": "fake-refresh-token",
        "expires_in": 3600,
        "token_type": "Bearer"
    }))
    .into_response()
}

async fn fake_userinfo(State(fake): State<FakeState>, headers: HeaderMap) -> Response {
    fake.userinfo_calls.fetch_add(1, Ordering::SeqCst);
    let expected = format!("Bearer {FAKE_ACCESS_TOKEN}");
    if headers.get(header::AUTHORIZATION).and_then(|h| h.to_str().ok()) != Some(expected.as_str()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(fake.profile.clone()).into_response()
}

/// Serve a fake provider on an ephemeral local port.
#[allow(dead_code)]
pub async fn spawn_fake_provider(profile: serde_json::Value, token_delay: Duration) -> FakeProvider {
    let token_calls = Arc::new(AtomicUsize::new(0));
    let userinfo_calls = Arc::new(AtomicUsize::new(0));
    let fake = FakeState {
        profile,
        token_delay,
        token_calls: token_calls.clone(),
        userinfo_calls: userinfo_calls.clone(),
    };

    let app = Router::new()
        .route("/token", post(fake_token))
        .route("/userinfo", get(fake_userinfo))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeProvider {
        base_url: format!("http://{addr}"),
        token_calls,
        userinfo_calls,
    }
}

/// Test config with `provider` pointed at `fake`.
#[allow(dead_code)]
pub fn config_with_provider(provider: Provider, fake: &FakeProvider) -> Config {
    let mut config = Config::test_default();
    let cfg = ProviderConfig::new(
        provider,
        "test-client",
        "test-secret",
        format!("http://localhost:8080/callback/{provider}"),
    )
    .with_base_url(&fake.base_url);
    match provider {
        Provider::Google => config.google = Some(cfg),
        Provider::Linkedin => config.linkedin = Some(cfg),
        Provider::Youtube => config.youtube = Some(cfg),
        Provider::Local => {}
    }
    config
}

/// Connect to the Firestore emulator.
#[allow(dead_code)]
pub async fn test_db() -> Db {
    Db::connect(&pathway_api::config::DatabaseUrl::Firestore {
        project_id: "test-project".to_string(),
    })
    .await
    .expect("Failed to connect to Firestore emulator")
}

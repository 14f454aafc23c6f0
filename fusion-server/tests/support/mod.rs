#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use argon2::Params;
use axum::Router;
use axum_test::TestServer;
use fusion_core::auth::{
    BackendUser, BasicBackend, ClientKey, digest_api_key, hash_secret_with_params,
};
use fusion_core::{
    Authenticator, ClientRegistry, CredentialBackend, InMemorySessionStore, Info,
    ResourceConfig, SessionManager, SessionSealer,
};
use fusion_server::AppState;
use fusion_server::cases::{CaseHooks, InMemoryCaseStore, RESOURCE_NAME};
use fusion_server::resources::ResourceApi;
use fusion_server::routes::create_app;
use serde_json::{Value, json};

pub const USERNAME: &str = "test";
pub const PASSWORD: &str = "correct";
pub const OUTSIDER: &str = "outsider";
pub const API_KEY: &str = "fsn_test_client_key_0123456789abcdef";

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Argon2id digest with parameters small enough for debug test builds.
pub fn cheap_digest(secret: &str) -> String {
    let params = Params::new(8, 1, 1, None).expect("valid argon2 params");
    hash_secret_with_params(secret, params).expect("digest")
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub cases: InMemoryCaseStore,
}

pub fn build_state() -> Result<AppState> {
    let users = [
        BackendUser {
            username: USERNAME.into(),
            digest: cheap_digest(PASSWORD),
            groups: ["TEST".to_string()].into(),
        },
        BackendUser {
            username: OUTSIDER.into(),
            digest: cheap_digest(PASSWORD),
            groups: ["OTHER".to_string()].into(),
        },
    ];
    let clients = ClientRegistry::new([ClientKey {
        name: "collector".into(),
        key_digest: digest_api_key(API_KEY),
        groups: ["TEST".to_string()].into(),
    }])?;

    let authenticator =
        Authenticator::new(CredentialBackend::Basic(BasicBackend::new(users)?))
            .with_clients(clients);
    let sessions = SessionManager::new(
        Arc::new(SessionSealer::from_key(&[7u8; 32])),
        Arc::new(InMemorySessionStore::new()),
    );

    Ok(AppState::new(authenticator, sessions)
        .with_info(Info::new("test", "x.y.z"), ResourceConfig::public()))
}

pub fn case_router(state: &AppState, cases: &InMemoryCaseStore) -> Router {
    ResourceApi::new(RESOURCE_NAME, Arc::new(CaseHooks::new(cases.clone())))
        .with_config(ResourceConfig::default().with_required_groups(["TEST"]))
        .into_router(state.clone())
}

pub fn build_test_app() -> Result<TestApp> {
    let state = build_state()?;
    let cases = InMemoryCaseStore::new();
    let app = create_app(state.clone(), [case_router(&state, &cases)]);
    let server =
        TestServer::new(app).map_err(|err| anyhow::anyhow!(err.to_string()))?;

    Ok(TestApp {
        server,
        state,
        cases,
    })
}

/// Log in and return the session token from the response body.
pub async fn login(server: &TestServer, username: &str, password: &str) -> String {
    let response = server
        .post("/auth/login")
        .json(&json!({ "username": username, "secret": password }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["data"]["token"]
        .as_str()
        .unwrap_or_else(|| panic!("token missing from login response: {body}"))
        .to_string()
}

/// Create a case as `token` and return its guid.
pub async fn create_case(server: &TestServer, token: &str, body: Value) -> String {
    let response = server
        .post("/case")
        .add_header("Authorization", bearer(token))
        .json(&body)
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let body: Value = response.json();
    body["data"]["guid"]
        .as_str()
        .unwrap_or_else(|| panic!("guid missing from create response: {body}"))
        .to_string()
}

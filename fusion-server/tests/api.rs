use std::future::IntoFuture;

use anyhow::Result;
use axum::body::Bytes;
use axum::http::{StatusCode, header};
use axum_test::TestServer;
use serde_json::{Value, json};

#[path = "support/mod.rs"]
mod support;
use support::{
    API_KEY, OUTSIDER, PASSWORD, USERNAME, bearer, build_test_app, create_case, login,
};

fn session_cookie(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[tokio::test]
async fn login_sets_cookie_and_info_is_public() -> Result<()> {
    let app = build_test_app()?;

    let response = app
        .server
        .post("/auth/login")
        .json(&json!({ "username": USERNAME, "secret": PASSWORD }))
        .await;
    response.assert_status_ok();

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("login sets a cookie")
        .to_string();
    assert!(set_cookie.starts_with("fusion_session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));

    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["identity"]["subject"], USERNAME);
    assert_eq!(body["data"]["identity"]["groups"], json!(["TEST"]));

    let info = app.server.get("/info").await;
    info.assert_status_ok();
    let body: Value = info.json();
    assert_eq!(body["data"], json!({ "api": "test", "version": "x.y.z" }));
    Ok(())
}

#[tokio::test]
async fn password_field_is_accepted_as_secret() -> Result<()> {
    let app = build_test_app()?;
    let response = app
        .server
        .post("/auth/login")
        .json(&json!({ "username": USERNAME, "password": PASSWORD }))
        .await;
    response.assert_status_ok();
    Ok(())
}

#[tokio::test]
async fn wrong_password_and_unknown_user_look_the_same() -> Result<()> {
    let app = build_test_app()?;

    let wrong = app
        .server
        .post("/auth/login")
        .json(&json!({ "username": USERNAME, "secret": "incorrect" }))
        .await;
    wrong.assert_status(StatusCode::UNAUTHORIZED);

    let unknown = app
        .server
        .post("/auth/login")
        .json(&json!({ "username": "nobody", "secret": PASSWORD }))
        .await;
    unknown.assert_status(StatusCode::UNAUTHORIZED);

    let a: Value = wrong.json();
    let b: Value = unknown.json();
    assert_eq!(a, b);
    assert!(wrong.headers().get(header::SET_COOKIE).is_none());
    Ok(())
}

#[tokio::test]
async fn login_rejects_malformed_body() -> Result<()> {
    let app = build_test_app()?;
    let response = app
        .server
        .post("/auth/login")
        .bytes(Bytes::from_static(b"{\"username\":"))
        .content_type("application/json")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["status"], 400);
    Ok(())
}

#[tokio::test]
async fn case_lifecycle_requires_a_session() -> Result<()> {
    let app = build_test_app()?;
    let token = login(&app.server, USERNAME, PASSWORD).await;

    let guid = create_case(
        &app.server,
        &token,
        json!({ "name": "test case", "managed": true }),
    )
    .await;

    let fetched = app
        .server
        .get(&format!("/case/{guid}"))
        .add_header("Authorization", bearer(&token))
        .await;
    fetched.assert_status_ok();
    let body: Value = fetched.json();
    assert_eq!(body["data"]["name"], "test case");
    assert_eq!(body["data"]["managed"], true);

    let anonymous = app.server.get(&format!("/case/{guid}")).await;
    anonymous.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = anonymous.json();
    assert_eq!(body["error"]["status"], 401);

    let updated = app
        .server
        .put(&format!("/case/{guid}"))
        .add_header("Authorization", bearer(&token))
        .json(&json!({ "tsid": "#00000000" }))
        .await;
    updated.assert_status_ok();
    let body: Value = updated.json();
    assert_eq!(body["data"]["tsid"], "#00000000");
    assert_eq!(body["data"]["name"], "test case");

    let listed = app
        .server
        .get("/case")
        .add_header("Authorization", bearer(&token))
        .await;
    listed.assert_status_ok();
    let body: Value = listed.json();
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn missing_cases_and_attach_conflicts() -> Result<()> {
    let app = build_test_app()?;
    let token = login(&app.server, USERNAME, PASSWORD).await;

    let missing = app
        .server
        .put("/case/does-not-exist")
        .add_header("Authorization", bearer(&token))
        .json(&json!({ "name": "renamed" }))
        .await;
    missing.assert_status(StatusCode::NOT_FOUND);

    let first = create_case(&app.server, &token, json!({ "name": "first" })).await;
    let second = create_case(&app.server, &token, json!({ "name": "second" })).await;

    let attach = app
        .server
        .post(&format!("/case/{first}/attach/moved"))
        .add_header("Authorization", bearer(&token))
        .await;
    attach.assert_status_ok();
    let body: Value = attach.json();
    assert_eq!(body["data"]["guid"], "moved");
    assert_eq!(body["data"]["name"], "first");

    let again = app
        .server
        .post(&format!("/case/{first}/attach/moved"))
        .add_header("Authorization", bearer(&token))
        .await;
    again.assert_status(StatusCode::NOT_FOUND);

    let occupied = app
        .server
        .post(&format!("/case/{second}/attach/moved"))
        .add_header("Authorization", bearer(&token))
        .await;
    occupied.assert_status(StatusCode::CONFLICT);

    let onto_itself = app
        .server
        .post(&format!("/case/{second}/attach/{second}"))
        .add_header("Authorization", bearer(&token))
        .await;
    onto_itself.assert_status(StatusCode::BAD_REQUEST);

    assert!(app.cases.get(&second).await.is_some());
    assert_eq!(app.cases.len().await, 2);
    Ok(())
}

#[tokio::test]
async fn concurrent_attaches_have_one_winner() -> Result<()> {
    let app = build_test_app()?;
    let token = login(&app.server, USERNAME, PASSWORD).await;
    let guid = create_case(&app.server, &token, json!({ "name": "contested" })).await;

    let attach = |server: &TestServer, target: &str| {
        server
            .post(&format!("/case/{guid}/attach/{target}"))
            .add_header("Authorization", bearer(&token))
            .into_future()
    };
    let (a, b) = futures::join!(attach(&app.server, "left"), attach(&app.server, "right"));

    let mut statuses = [a.status_code().as_u16(), b.status_code().as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, [200, 404]);
    assert_eq!(app.cases.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_bad_request_after_the_gate() -> Result<()> {
    let app = build_test_app()?;

    let anonymous = app
        .server
        .post("/case")
        .bytes(Bytes::from_static(b"{not json"))
        .content_type("application/json")
        .await;
    anonymous.assert_status(StatusCode::UNAUTHORIZED);

    let token = login(&app.server, USERNAME, PASSWORD).await;
    let malformed = app
        .server
        .post("/case")
        .add_header("Authorization", bearer(&token))
        .bytes(Bytes::from_static(b"{not json"))
        .content_type("application/json")
        .await;
    malformed.assert_status(StatusCode::BAD_REQUEST);

    let nameless = app
        .server
        .post("/case")
        .add_header("Authorization", bearer(&token))
        .json(&json!({ "managed": true }))
        .await;
    nameless.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn group_mismatch_is_forbidden() -> Result<()> {
    let app = build_test_app()?;
    let token = login(&app.server, OUTSIDER, PASSWORD).await;

    let response = app
        .server
        .get("/case")
        .add_header("Authorization", bearer(&token))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"]["status"], 403);
    Ok(())
}

#[tokio::test]
async fn api_keys_authenticate_clients() -> Result<()> {
    let app = build_test_app()?;

    let listed = app.server.get("/case").add_header("X-Api-Key", API_KEY).await;
    listed.assert_status_ok();

    let identity = app
        .server
        .get("/auth/identity")
        .add_header("X-Api-Key", API_KEY)
        .await;
    identity.assert_status_ok();
    let body: Value = identity.json();
    assert_eq!(body["data"]["subject"], "collector");

    let wrong = app
        .server
        .get("/case")
        .add_header("X-Api-Key", "fsn_not_the_key")
        .await;
    wrong.assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn session_cookie_authenticates_requests() -> Result<()> {
    let app = build_test_app()?;
    let response = app
        .server
        .post("/auth/login")
        .json(&json!({ "username": USERNAME, "secret": PASSWORD }))
        .await;
    response.assert_status_ok();
    let cookie = session_cookie(
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .expect("login sets a cookie"),
    );

    let listed = app.server.get("/case").add_header("Cookie", cookie).await;
    listed.assert_status_ok();
    Ok(())
}

#[tokio::test]
async fn logout_revokes_the_session_server_side() -> Result<()> {
    let app = build_test_app()?;
    let token = login(&app.server, USERNAME, PASSWORD).await;

    let logout = app
        .server
        .post("/auth/logout")
        .add_header("Authorization", bearer(&token))
        .await;
    logout.assert_status_ok();
    let cleared = logout
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("logout clears the cookie");
    assert!(cleared.contains("Max-Age=0"));

    // The token still unseals; only the store record is gone.
    assert!(app.state.sessions.sealer().unseal(&token).is_ok());

    let after = app
        .server
        .get("/case")
        .add_header("Authorization", bearer(&token))
        .await;
    after.assert_status(StatusCode::UNAUTHORIZED);

    let twice = app
        .server
        .post("/auth/logout")
        .add_header("Authorization", bearer(&token))
        .await;
    twice.assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn forged_tokens_are_unauthenticated() -> Result<()> {
    let app = build_test_app()?;
    let response = app
        .server
        .get("/case")
        .add_header("Authorization", bearer("v1.bm90LWEtcmVhbC10b2tlbg"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn unknown_routes_return_json_not_found() -> Result<()> {
    let app = build_test_app()?;
    let response = app.server.get("/nowhere").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["status"], 404);
    Ok(())
}

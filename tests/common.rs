//! Shared helpers for the HTTP integration tests.

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use ctfboard::config::Config;
use ctfboard::web::{app, AppState};

/// Build an app over a throwaway data directory. The tempdir must outlive the
/// returned state.
pub async fn test_app() -> (tempfile::TempDir, AppState, Router) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut config = Config::default();
    config.storage.data_dir = tmp.path().to_str().unwrap().to_string();
    config.logging.file = None;
    let state = AppState::new(config).await.expect("app state");
    let router = app(state.clone());
    (tmp, state, router)
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, format!("sid={}", cookie));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, format!("sid={}", cookie));
    }
    builder.body(Body::empty()).expect("request")
}

/// Register `username` and log them in; returns the session token.
pub async fn register_and_login(router: &Router, username: &str) -> String {
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/register",
            None,
            json!({ "username": username, "password": "hunter22!" }),
        ))
        .await
        .expect("register");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            json!({ "username": username, "password": "hunter22!" }),
        ))
        .await
        .expect("login");
    assert_eq!(response.status(), StatusCode::OK);
    session_token(&response)
}

/// Pull the `sid` value out of a Set-Cookie header.
pub fn session_token(response: &Response<Body>) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("Set-Cookie header")
        .to_str()
        .expect("cookie string");
    let pair = set_cookie.split(';').next().expect("cookie pair");
    let (name, value) = pair.split_once('=').expect("cookie value");
    assert_eq!(name, "sid");
    value.to_string()
}

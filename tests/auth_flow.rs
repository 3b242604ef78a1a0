//! Registration, login, logout, and the auth guards on both route classes.

mod common;

use axum::http::{header, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::{body_json, get_request, json_request, register_and_login, test_app};

#[tokio::test]
async fn register_login_logout_round_trip() {
    let (_tmp, state, router) = test_app().await;
    let token = register_and_login(&router, "alice").await;

    // Session is live
    let response = router
        .clone()
        .oneshot(get_request("/grades", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(json_request("POST", "/logout", Some(&token), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));
    assert!(state.sessions.read().await.is_empty());

    // The old token no longer works
    let response = router
        .clone()
        .oneshot(get_request("/grades", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn duplicate_and_invalid_registrations_are_rejected() {
    let (_tmp, _state, router) = test_app().await;
    register_and_login(&router, "alice").await;

    for (username, password) in [
        ("alice", "hunter22!"),     // taken
        ("a", "hunter22!"),         // too short
        ("admin", "hunter22!"),     // reserved
        ("../evil", "hunter22!"),   // path hostile
        ("bob", "short"),           // weak password
    ] {
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/register",
                None,
                json!({ "username": username, "password": password }),
            ))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "username {:?}",
            username
        );
    }
}

#[tokio::test]
async fn registration_seeds_the_chapel_grade() {
    let (_tmp, _state, router) = test_app().await;
    let token = register_and_login(&router, "alice").await;

    let response = router
        .clone()
        .oneshot(get_request("/grades", Some(&token)))
        .await
        .unwrap();
    let body = body_json(response).await;
    let grades = body["grades"].as_array().unwrap();
    assert_eq!(grades.len(), 1);
    assert_eq!(grades[0]["subject"], "채플");
    assert_eq!(grades[0]["score"], "NP");
}

#[tokio::test]
async fn wrong_password_and_unknown_user_both_fail_the_same_way() {
    let (_tmp, _state, router) = test_app().await;
    register_and_login(&router, "alice").await;

    for (username, password) in [("alice", "wrong-pass"), ("nobody", "hunter22!")] {
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/login",
                None,
                json!({ "username": username, "password": password }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "invalid credentials");
    }
}

#[tokio::test]
async fn page_routes_redirect_and_api_routes_401_when_anonymous() {
    let (_tmp, _state, router) = test_app().await;

    for uri in ["/notices", "/grades", "/assignments", "/games"] {
        let response = router.clone().oneshot(get_request(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "uri {}", uri);
        assert_eq!(response.headers()["location"], "/login");
    }

    for uri in ["/api/games/puzzle/swap", "/api/games/volume/complete"] {
        let response = router
            .clone()
            .oneshot(json_request("POST", uri, None, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "uri {}", uri);
        assert_eq!(body_json(response).await["error"], "login required");
    }
}

#[tokio::test]
async fn bogus_session_token_is_treated_as_anonymous() {
    let (_tmp, _state, router) = test_app().await;
    register_and_login(&router, "alice").await;

    let response = router
        .clone()
        .oneshot(get_request("/grades", Some("not-a-real-token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn two_logins_get_independent_sessions() {
    let (_tmp, state, router) = test_app().await;
    let first = register_and_login(&router, "alice").await;

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            json!({ "username": "alice", "password": "hunter22!" }),
        ))
        .await
        .unwrap();
    let second = common::session_token(&response);

    assert_ne!(first, second);
    assert_eq!(state.sessions.read().await.len(), 2);

    // Logging one out leaves the other alive
    router
        .clone()
        .oneshot(json_request("POST", "/logout", Some(&first), json!({})))
        .await
        .unwrap();
    let response = router
        .clone()
        .oneshot(get_request("/grades", Some(&second)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

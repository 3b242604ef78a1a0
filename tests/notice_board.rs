//! Notice board listing and the hidden-by-listing-only staff notice.

mod common;

use axum::http::StatusCode;
use tower::ServiceExt;

use common::{body_json, get_request, register_and_login, test_app};

#[tokio::test]
async fn listing_shows_only_public_notices() {
    let (_tmp, _state, router) = test_app().await;
    let token = register_and_login(&router, "alice").await;

    let response = router
        .clone()
        .oneshot(get_request("/notices", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let notices = body["notices"].as_array().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0]["idx"], 1);
    assert_eq!(notices[0]["title"], "Welcome to Myongji CTF!");
}

#[tokio::test]
async fn hidden_notice_is_still_reachable_by_index() {
    let (_tmp, _state, router) = test_app().await;
    let token = register_and_login(&router, "alice").await;

    let response = router
        .clone()
        .oneshot(get_request("/notices/0", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let notice = body_json(response).await;
    assert_eq!(notice["title"], "Notice 0: Staff-only");
    assert_eq!(notice["is_public"], false);
}

#[tokio::test]
async fn unknown_notice_index_is_not_found() {
    let (_tmp, _state, router) = test_app().await;
    let token = register_and_login(&router, "alice").await;

    let response = router
        .clone()
        .oneshot(get_request("/notices/42", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "notice not found");
}

#[tokio::test]
async fn limit_query_caps_the_listing() {
    let (_tmp, _state, router) = test_app().await;
    let token = register_and_login(&router, "alice").await;

    let response = router
        .clone()
        .oneshot(get_request("/notices?limit=0", Some(&token)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["notices"].as_array().unwrap().len(), 0);
}

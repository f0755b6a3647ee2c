// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access-control tests for both guards: bearer-token + role, and the
//! static integration key.

use axum::http::StatusCode;
use hugger_api::config::Config;
use hugger_api::models::{ProfileUpdate, UserType};
use serde_json::json;

mod common;

// ─── Bearer-token + role guard ───────────────────────────────

#[tokio::test]
async fn admin_route_requires_bearer_token() {
    let t = common::create_test_app();

    let (status, _) =
        common::post_json(&t.app, "/api/grant-admin", json!({ "email": "x@y.com" }), &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Malformed scheme is also unauthorized.
    let (status, _) = common::post_json(
        &t.app,
        "/api/grant-admin",
        json!({ "email": "x@y.com" }),
        &[("authorization", "Basic abc")],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_route_rejects_invalid_token() {
    let t = common::create_test_app();

    let (status, body) = common::post_json(
        &t.app,
        "/api/grant-admin",
        json!({ "email": "x@y.com" }),
        &[("authorization", "Bearer not-a-real-token")],
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn admin_route_rejects_non_admin_profile() {
    let t = common::create_test_app();

    let uid = t
        .state
        .identity
        .mock_seed_user("user@example.com", "pw", None)
        .await;
    t.state
        .identity
        .mock_seed_token("user-token", &uid, Some("user@example.com"), None)
        .await;
    t.state
        .db
        .merge_profile(
            &uid,
            &ProfileUpdate {
                uid: Some(uid.clone()),
                user_type: Some(UserType::User),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (status, body) = common::post_json(
        &t.app,
        "/api/grant-admin",
        json!({ "email": "x@y.com" }),
        &[("authorization", "Bearer user-token")],
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn admin_route_rejects_token_with_no_profile() {
    let t = common::create_test_app();

    let uid = t
        .state
        .identity
        .mock_seed_user("orphan@example.com", "pw", None)
        .await;
    t.state
        .identity
        .mock_seed_token("orphan-token", &uid, None, None)
        .await;

    let (status, _) = common::post_json(
        &t.app,
        "/api/grant-admin",
        json!({ "email": "x@y.com" }),
        &[("authorization", "Bearer orphan-token")],
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_route_accepts_admin_profile() {
    let t = common::create_test_app();
    common::seed_admin(&t.state, "admin-token").await;

    let (status, body) = common::post_json(
        &t.app,
        "/api/grant-admin",
        json!({ "email": "target@example.com" }),
        &[("authorization", "Bearer admin-token")],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

// ─── Static-key guard ────────────────────────────────────────

#[tokio::test]
async fn ghl_route_requires_key_header() {
    let t = common::create_test_app();

    let (status, body) = common::post_json(
        &t.app,
        "/api/ghl/create-user",
        json!({ "email": "x@y.com" }),
        &[],
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn ghl_route_rejects_wrong_key() {
    let t = common::create_test_app();

    let (status, body) = common::post_json(
        &t.app,
        "/api/ghl/create-user",
        json!({ "email": "x@y.com" }),
        &[("x-api-key", "wrong-key")],
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn ghl_route_unconfigured_key_is_server_error() {
    let mut config = Config::test_default();
    config.ghl_api_key = None;
    let t = common::create_test_app_with_config(config);

    // Even a well-formed request never reaches the handler.
    let (status, body) = common::post_json(
        &t.app,
        "/api/ghl/create-user",
        json!({ "email": "x@y.com" }),
        &[("x-api-key", "test_ghl_key")],
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "configuration_error");

    let counters = t.state.identity.mock_counters().await;
    assert_eq!(counters.lookups, 0);
    assert_eq!(counters.creates, 0);
}

#[tokio::test]
async fn unmatched_route_returns_json_404() {
    let t = common::create_test_app();

    let (status, body) = common::get_json(&t.app, "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn health_check_is_public() {
    let t = common::create_test_app();

    let (status, body) = common::get_json(&t.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use hugger_api::config::Config;
use hugger_api::db::ProfileDb;
use hugger_api::models::{ProfileUpdate, UserType};
use hugger_api::routes::create_router;
use hugger_api::services::{
    IdentityClient, MessagingClient, NotificationService, ProvisioningService,
};
use hugger_api::AppState;
use std::sync::Arc;
use tower::ServiceExt;

/// Shared integration-test key, matching `Config::test_default`.
#[allow(dead_code)]
pub const GHL_KEY: &[(&str, &str)] = &[("x-api-key", "test_ghl_key")];

/// Test harness: the real router over in-memory collaborators.
pub struct TestApp {
    pub app: axum::Router,
    pub state: Arc<AppState>,
    pub messaging: MessagingClient,
}

/// Create a test app with in-memory identity, profile store, and messaging.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::test_default())
}

/// Same, with a caller-adjusted config.
#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> TestApp {
    let db = ProfileDb::new_in_memory();
    let identity = IdentityClient::new_in_memory();
    let messaging = MessagingClient::new_in_memory();

    let provisioning = ProvisioningService::new(identity.clone(), db.clone());
    let notifications = NotificationService::new(db.clone(), messaging.clone());

    let state = Arc::new(AppState {
        config,
        db,
        identity,
        provisioning,
        notifications,
    });

    TestApp {
        app: create_router(state.clone()),
        state,
        messaging,
    }
}

/// Seed an admin identity + profile and a bearer token resolving to it.
/// Returns the admin's uid.
#[allow(dead_code)]
pub async fn seed_admin(state: &Arc<AppState>, token: &str) -> String {
    let uid = state
        .identity
        .mock_seed_user("admin@example.com", "seeded-pw", Some("Root Admin"))
        .await;
    state
        .identity
        .mock_seed_token(token, &uid, Some("admin@example.com"), Some("Root Admin"))
        .await;
    state
        .db
        .merge_profile(
            &uid,
            &ProfileUpdate {
                uid: Some(uid.clone()),
                email: Some("admin@example.com".to_string()),
                user_type: Some(UserType::Admin),
                display_name: Some("Root Admin".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("seeding admin profile");
    uid
}

/// POST a JSON body and return (status, parsed JSON body).
#[allow(dead_code)]
pub async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
    headers: &[(&str, &str)],
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }

    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    read_response(response).await
}

/// GET and return (status, parsed JSON body).
#[allow(dead_code)]
pub async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    read_response(response).await
}

async fn read_response(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, body)
}

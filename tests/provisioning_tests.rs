// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provisioning workflow tests: create-or-update semantics, conflict
//! handling, password issuance, and field provenance.

use axum::http::StatusCode;
use hugger_api::models::{AccountStatus, AccountType, CreationEndpoint, UserType};
use serde_json::json;

mod common;

#[tokio::test]
async fn ghl_create_user_provisions_identity_and_profile() {
    let t = common::create_test_app();

    let (status, body) = common::post_json(
        &t.app,
        "/api/ghl/create-user",
        json!({ "email": "new@example.com", "firstName": "New", "lastName": "User" }),
        common::GHL_KEY,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let uid = body["uid"].as_str().unwrap().to_string();
    let temp_password = body["tempPassword"].as_str().unwrap().to_string();
    assert_eq!(temp_password.len(), 12);

    // Exactly one identity created, with the generated credential and the
    // forced-password-change claim.
    let record = t.state.identity.mock_user("new@example.com").await.unwrap();
    assert_eq!(record.uid, uid);
    assert_eq!(record.password, temp_password);
    assert_eq!(record.claims, Some(json!({ "mustChangePassword": true })));

    let counters = t.state.identity.mock_counters().await;
    assert_eq!(counters.creates, 1);
    assert_eq!(counters.claims_writes, 1);
    assert_eq!(counters.password_updates, 0);
    assert_eq!(t.state.identity.mock_user_count().await, 1);

    // Profile written with provenance and lifecycle fields.
    let profile = t.state.db.get_profile(&uid).await.unwrap().unwrap();
    assert_eq!(profile.email.as_deref(), Some("new@example.com"));
    assert_eq!(profile.user_type, Some(UserType::User));
    assert_eq!(profile.account_type, Some(AccountType::Premium));
    assert_eq!(profile.account_status, Some(AccountStatus::Active));
    assert_eq!(
        profile.creation_endpoint,
        Some(CreationEndpoint::GhlCreateUser)
    );
    assert_eq!(profile.created_by.as_deref(), Some("GHL Integration"));
    assert_eq!(profile.display_name.as_deref(), Some("New User"));
    assert!(profile.created_at.is_some());
    assert_eq!(profile.temp_password.as_deref(), Some(temp_password.as_str()));
    assert!(profile.password_generated_at.is_some());
}

#[tokio::test]
async fn ghl_create_trial_user_sets_trial_tier() {
    let t = common::create_test_app();

    let (status, body) = common::post_json(
        &t.app,
        "/api/ghl/create-trial-user",
        json!({ "email": "trial@example.com" }),
        common::GHL_KEY,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let uid = body["uid"].as_str().unwrap();

    let profile = t.state.db.get_profile(uid).await.unwrap().unwrap();
    assert_eq!(profile.account_type, Some(AccountType::Trial));
    assert_eq!(
        profile.creation_endpoint,
        Some(CreationEndpoint::GhlCreateTrialUser)
    );
}

#[tokio::test]
async fn ghl_create_user_conflict_performs_no_writes() {
    let t = common::create_test_app();
    let uid = t
        .state
        .identity
        .mock_seed_user("known@example.com", "original-pw", None)
        .await;

    let (status, body) = common::post_json(
        &t.app,
        "/api/ghl/create-user",
        json!({ "email": "known@example.com", "tempPassword": "Replacement1" }),
        common::GHL_KEY,
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "user_exists");
    assert_eq!(body["uid"], uid);

    // The identity is untouched and no profile was written.
    let record = t.state.identity.mock_user("known@example.com").await.unwrap();
    assert_eq!(record.password, "original-pw");
    assert_eq!(record.claims, None);

    let counters = t.state.identity.mock_counters().await;
    assert_eq!(counters.creates, 0);
    assert_eq!(counters.password_updates, 0);
    assert_eq!(counters.claims_writes, 0);

    assert!(t.state.db.get_profile(&uid).await.unwrap().is_none());
}

#[tokio::test]
async fn grant_admin_creates_missing_identity() {
    let t = common::create_test_app();
    common::seed_admin(&t.state, "admin-token").await;

    let (status, body) = common::post_json(
        &t.app,
        "/api/grant-admin",
        json!({ "email": "fresh@example.com" }),
        &[("authorization", "Bearer admin-token")],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let uid = body["uid"].as_str().unwrap();
    assert!(body["tempPassword"].is_string());

    let record = t.state.identity.mock_user("fresh@example.com").await.unwrap();
    assert_eq!(record.claims, Some(json!({ "mustChangePassword": true })));

    let profile = t.state.db.get_profile(uid).await.unwrap().unwrap();
    assert_eq!(profile.user_type, Some(UserType::Admin));
    assert_eq!(profile.account_type, Some(AccountType::AdminCreated));
    assert_eq!(profile.creation_endpoint, Some(CreationEndpoint::GrantAdmin));
    assert!(profile.created_at.is_some());
    // Provenance records the resolved caller name.
    assert_eq!(profile.created_by.as_deref(), Some("Root Admin"));
}

#[tokio::test]
async fn grant_admin_on_existing_identity_updates_profile_only() {
    let t = common::create_test_app();
    common::seed_admin(&t.state, "admin-token").await;
    let uid = t
        .state
        .identity
        .mock_seed_user("promote@example.com", "keep-pw", Some("Existing Name"))
        .await;

    let (status, body) = common::post_json(
        &t.app,
        "/api/grant-admin",
        json!({ "email": "promote@example.com" }),
        &[("authorization", "Bearer admin-token")],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uid"], uid);
    // No credential issued: the identity already existed and no password
    // was supplied.
    assert!(body.get("tempPassword").is_none());

    let counters = t.state.identity.mock_counters().await;
    assert_eq!(counters.creates, 0);
    assert_eq!(counters.password_updates, 0);
    assert_eq!(counters.claims_writes, 1);

    let record = t
        .state
        .identity
        .mock_user("promote@example.com")
        .await
        .unwrap();
    assert_eq!(record.password, "keep-pw");

    let profile = t.state.db.get_profile(&uid).await.unwrap().unwrap();
    assert_eq!(profile.user_type, Some(UserType::Admin));
    // createdAt is reserved for the new-identity branch.
    assert!(profile.created_at.is_none());
    assert!(profile.temp_password.is_none());
    // Display name falls back to the identity's existing one.
    assert_eq!(profile.display_name.as_deref(), Some("Existing Name"));
}

#[tokio::test]
async fn create_user_with_supplied_password_rotates_credential() {
    let t = common::create_test_app();
    common::seed_admin(&t.state, "admin-token").await;
    let uid = t
        .state
        .identity
        .mock_seed_user("rotate@example.com", "old-pw", None)
        .await;

    let (status, body) = common::post_json(
        &t.app,
        "/api/create-user",
        json!({ "email": "rotate@example.com", "tempPassword": "NewSecret99" }),
        &[("authorization", "Bearer admin-token")],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tempPassword"], "NewSecret99");

    let record = t.state.identity.mock_user("rotate@example.com").await.unwrap();
    assert_eq!(record.password, "NewSecret99");

    let counters = t.state.identity.mock_counters().await;
    assert_eq!(counters.creates, 0);
    assert_eq!(counters.password_updates, 1);

    let profile = t.state.db.get_profile(&uid).await.unwrap().unwrap();
    assert_eq!(profile.temp_password.as_deref(), Some("NewSecret99"));
    assert!(profile.password_generated_at.is_some());
    assert_eq!(profile.creation_endpoint, Some(CreationEndpoint::CreateUser));
}

#[tokio::test]
async fn invalid_email_rejected_before_provider_calls() {
    let t = common::create_test_app();

    for email in [json!(null), json!(""), json!("not-an-email"), json!("user@localhost")] {
        let (status, body) = common::post_json(
            &t.app,
            "/api/ghl/create-user",
            json!({ "email": email }),
            common::GHL_KEY,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");
    }

    let counters = t.state.identity.mock_counters().await;
    assert_eq!(counters.lookups, 0);
    assert_eq!(counters.creates, 0);
}

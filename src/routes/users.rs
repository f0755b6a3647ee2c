// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public user routes: listing, hugger flags, claim maintenance.

use crate::error::Result;
use crate::models::{
    AccountStatus, AccountType, CreationEndpoint, TripleHugger, UserProfile, UserType,
};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/make-triple-hugger", post(make_triple_hugger))
        .route("/api/make-double-hugger", post(make_double_hugger))
        .route(
            "/api/remove-password-change-requirement",
            post(remove_password_change_requirement),
        )
}

// ─── User listing ────────────────────────────────────────────

/// Profile as exposed over the listing endpoint.
///
/// Credentials and device tokens stay out of the response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_type: Option<UserType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_type: Option<AccountType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_status: Option<AccountStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    creation_endpoint: Option<CreationEndpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(rename = "is_triple_hugger", skip_serializing_if = "Option::is_none")]
    triple_hugger: Option<TripleHugger>,
}

impl From<UserProfile> for UserSummary {
    fn from(profile: UserProfile) -> Self {
        Self {
            uid: profile.uid,
            email: profile.email,
            user_type: profile.user_type,
            account_type: profile.account_type,
            account_status: profile.account_status,
            creation_endpoint: profile.creation_endpoint,
            display_name: profile.display_name,
            created_at: profile.created_at,
            triple_hugger: profile.triple_hugger,
        }
    }
}

#[derive(Serialize)]
struct UsersResponse {
    success: bool,
    users: Vec<UserSummary>,
    total: u32,
}

/// List every user profile.
async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<UsersResponse>> {
    let profiles = state.db.list_profiles().await?;
    let users: Vec<UserSummary> = profiles.into_iter().map(Into::into).collect();
    let total = users.len() as u32;

    Ok(Json(UsersResponse {
        success: true,
        users,
        total,
    }))
}

// ─── Hugger flags ────────────────────────────────────────────

/// Body identifying a user by email only.
#[derive(Debug, Deserialize)]
pub struct EmailBody {
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct HuggerResponse {
    pub success: bool,
    pub uid: String,
    pub is_triple_hugger: TripleHugger,
}

async fn make_triple_hugger(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EmailBody>,
) -> Result<Json<HuggerResponse>> {
    set_hugger(&state, body, TripleHugger::Yes).await
}

async fn make_double_hugger(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EmailBody>,
) -> Result<Json<HuggerResponse>> {
    set_hugger(&state, body, TripleHugger::No).await
}

pub(crate) async fn set_hugger(
    state: &AppState,
    body: EmailBody,
    flag: TripleHugger,
) -> Result<Json<HuggerResponse>> {
    let uid = state.provisioning.set_triple_hugger(body.email, flag).await?;

    Ok(Json(HuggerResponse {
        success: true,
        uid,
        is_triple_hugger: flag,
    }))
}

// ─── Claim maintenance ───────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UidBody {
    uid: Option<String>,
}

#[derive(Serialize)]
struct ClaimResponse {
    success: bool,
    uid: String,
}

/// Clear the forced-password-change claim for a uid.
async fn remove_password_change_requirement(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UidBody>,
) -> Result<Json<ClaimResponse>> {
    let uid = body.uid.unwrap_or_default();
    state.provisioning.clear_password_requirement(&uid).await?;

    Ok(Json(ClaimResponse { success: true, uid }))
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes: provisioning and lifecycle transitions.
//!
//! All routes here sit behind the bearer-token admin guard; the guard
//! attaches the caller as an `AdminActor` extension.

use crate::error::Result;
use crate::middleware::admin_auth::AdminActor;
use crate::models::{AccountStatus, AccountType, CreationEndpoint, UserType};
use crate::services::provisioning::ProvisionRequest;
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Admin routes (require bearer-token admin auth).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/grant-admin", post(grant_admin))
        .route("/api/create-user", post(create_user))
        .route("/api/make-inactive", post(make_inactive))
        .route("/api/make-active", post(make_active))
}

// ─── Request/Response bodies ─────────────────────────────────

/// Body for provisioning endpoints.
///
/// `email` is validated (required, `local@domain.tld`) by the workflow
/// before any provider call.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionBody {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub temp_password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionResponse {
    pub success: bool,
    pub uid: String,
    pub email: String,
    /// Present only when a credential was generated or rotated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_password: Option<String>,
}

/// Body for status transitions: at least one of uid/email.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub uid: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    pub uid: String,
    pub account_status: AccountStatus,
}

// ─── Provisioning ────────────────────────────────────────────

/// Grant the admin role, creating the identity if needed.
async fn grant_admin(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AdminActor>,
    Json(body): Json<ProvisionBody>,
) -> Result<Json<ProvisionResponse>> {
    tracing::info!(actor = %actor.uid, "Granting admin role");

    let outcome = state
        .provisioning
        .provision(ProvisionRequest {
            email: body.email.unwrap_or_default(),
            first_name: body.first_name,
            last_name: body.last_name,
            temp_password: body.temp_password,
            role: UserType::Admin,
            account_type: AccountType::AdminCreated,
            endpoint: CreationEndpoint::GrantAdmin,
            created_by: actor.display_name.clone(),
            allow_existing: true,
        })
        .await?;

    Ok(Json(ProvisionResponse {
        success: true,
        uid: outcome.uid,
        email: outcome.email,
        temp_password: outcome.temp_password,
    }))
}

/// Create or update a regular user.
async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AdminActor>,
    Json(body): Json<ProvisionBody>,
) -> Result<Json<ProvisionResponse>> {
    tracing::info!(actor = %actor.uid, "Creating user");

    let outcome = state
        .provisioning
        .provision(ProvisionRequest {
            email: body.email.unwrap_or_default(),
            first_name: body.first_name,
            last_name: body.last_name,
            temp_password: body.temp_password,
            role: UserType::User,
            account_type: AccountType::AdminCreated,
            endpoint: CreationEndpoint::CreateUser,
            created_by: actor.display_name.clone(),
            allow_existing: true,
        })
        .await?;

    Ok(Json(ProvisionResponse {
        success: true,
        uid: outcome.uid,
        email: outcome.email,
        temp_password: outcome.temp_password,
    }))
}

// ─── Lifecycle transitions ───────────────────────────────────

async fn make_inactive(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AdminActor>,
    Json(body): Json<StatusBody>,
) -> Result<Json<StatusResponse>> {
    tracing::info!(actor = %actor.uid, "Deactivating account");
    set_status(&state, body, AccountStatus::Inactive).await
}

async fn make_active(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AdminActor>,
    Json(body): Json<StatusBody>,
) -> Result<Json<StatusResponse>> {
    tracing::info!(actor = %actor.uid, "Reactivating account");
    set_status(&state, body, AccountStatus::Active).await
}

pub(crate) async fn set_status(
    state: &AppState,
    body: StatusBody,
    status: AccountStatus,
) -> Result<Json<StatusResponse>> {
    let uid = state
        .provisioning
        .set_status(body.uid, body.email, status)
        .await?;

    Ok(Json(StatusResponse {
        success: true,
        uid,
        account_status: status,
    }))
}

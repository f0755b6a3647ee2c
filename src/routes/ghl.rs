// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GHL integration routes (static-key guarded).
//!
//! Called server-to-server by the CRM. Provisioning here refuses emails
//! that already have an identity (`allow_existing = false`).

use crate::error::Result;
use crate::models::{AccountStatus, AccountType, CreationEndpoint, TripleHugger, UserType};
use crate::routes::admin::{ProvisionBody, ProvisionResponse, StatusBody, StatusResponse};
use crate::routes::users::{EmailBody, HuggerResponse};
use crate::services::provisioning::ProvisionRequest;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;

/// Actor label recorded as `createdBy` for integration-driven writes.
const GHL_ACTOR: &str = "GHL Integration";

/// GHL routes (require the static integration key).
/// The key middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/ghl/create-user", post(create_user))
        .route("/api/ghl/create-trial-user", post(create_trial_user))
        .route("/api/ghl/make-inactive", post(make_inactive))
        .route("/api/ghl/make-active", post(make_active))
        .route("/api/ghl/make-triple-hugger", post(make_triple_hugger))
        .route("/api/ghl/make-double-hugger", post(make_double_hugger))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProvisionBody>,
) -> Result<Json<ProvisionResponse>> {
    provision(&state, body, AccountType::Premium, CreationEndpoint::GhlCreateUser).await
}

async fn create_trial_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProvisionBody>,
) -> Result<Json<ProvisionResponse>> {
    provision(
        &state,
        body,
        AccountType::Trial,
        CreationEndpoint::GhlCreateTrialUser,
    )
    .await
}

async fn provision(
    state: &AppState,
    body: ProvisionBody,
    account_type: AccountType,
    endpoint: CreationEndpoint,
) -> Result<Json<ProvisionResponse>> {
    let outcome = state
        .provisioning
        .provision(ProvisionRequest {
            email: body.email.unwrap_or_default(),
            first_name: body.first_name,
            last_name: body.last_name,
            temp_password: body.temp_password,
            role: UserType::User,
            account_type,
            endpoint,
            created_by: GHL_ACTOR.to_string(),
            allow_existing: false,
        })
        .await?;

    Ok(Json(ProvisionResponse {
        success: true,
        uid: outcome.uid,
        email: outcome.email,
        temp_password: outcome.temp_password,
    }))
}

async fn make_inactive(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StatusBody>,
) -> Result<Json<StatusResponse>> {
    crate::routes::admin::set_status(&state, body, AccountStatus::Inactive).await
}

async fn make_active(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StatusBody>,
) -> Result<Json<StatusResponse>> {
    crate::routes::admin::set_status(&state, body, AccountStatus::Active).await
}

async fn make_triple_hugger(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EmailBody>,
) -> Result<Json<HuggerResponse>> {
    crate::routes::users::set_hugger(&state, body, TripleHugger::Yes).await
}

async fn make_double_hugger(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EmailBody>,
) -> Result<Json<HuggerResponse>> {
    crate::routes::users::set_hugger(&state, body, TripleHugger::No).await
}

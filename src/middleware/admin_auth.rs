// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin authentication middleware (bearer token + role check).

use crate::error::AppError;
use crate::models::{UserProfile, UserType};
use crate::services::identity::VerifiedIdentity;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Authenticated admin caller, attached as a request extension.
#[derive(Debug, Clone)]
pub struct AdminActor {
    pub uid: String,
    /// Resolved human-readable name, used as `createdBy` provenance.
    pub display_name: String,
}

/// Middleware requiring a valid ID token belonging to an admin profile.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(h) if h.starts_with("Bearer ") && h.len() > 7 => h[7..].to_string(),
        _ => return Err(AppError::Unauthorized),
    };

    let verified = state.identity.verify_id_token(&token).await?;

    let profile = match state.db.get_profile(&verified.uid).await? {
        Some(profile) if profile.user_type == Some(UserType::Admin) => profile,
        Some(_) => {
            tracing::warn!(uid = %verified.uid, "Blocked non-admin request to admin route");
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        None => {
            tracing::warn!(uid = %verified.uid, "Blocked request with no profile to admin route");
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
    };

    let display_name = resolve_actor_name(&profile, &verified);
    request.extensions_mut().insert(AdminActor {
        uid: verified.uid,
        display_name,
    });

    Ok(next.run(request).await)
}

/// Profile displayName, else profile first+last, else token name, else
/// token email, else a generic label.
fn resolve_actor_name(profile: &UserProfile, verified: &VerifiedIdentity) -> String {
    if let Some(name) = profile.display_name.as_deref() {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }

    let joined = format!(
        "{} {}",
        profile.first_name.as_deref().unwrap_or(""),
        profile.last_name.as_deref().unwrap_or("")
    );
    let joined = joined.trim();
    if !joined.is_empty() {
        return joined.to_string();
    }

    if let Some(name) = verified.name.as_deref() {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }

    if let Some(email) = verified.email.as_deref() {
        if !email.trim().is_empty() {
            return email.trim().to_string();
        }
    }

    "Admin".to_string()
}

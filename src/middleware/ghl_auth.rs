// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Static-key authentication middleware for GHL integration routes.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

const API_KEY_HEADER: &str = "x-api-key";

/// Require the shared integration key on `/api/ghl/*` routes.
pub async fn require_ghl_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok());

    let Some(provided) = provided else {
        return Err(AppError::Unauthorized);
    };

    let expected = state
        .config
        .ghl_api_key
        .as_deref()
        .ok_or_else(|| AppError::Config("GHL_API_KEY is not configured".to_string()))?;

    if provided.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() != 1 {
        tracing::warn!("Blocked GHL request with mismatched API key");
        return Err(AppError::Forbidden("Invalid API key".to_string()));
    }

    Ok(next.run(request).await)
}

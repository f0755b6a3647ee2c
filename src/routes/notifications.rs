// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notification dispatch and stats routes.

use crate::error::{AppError, Result};
use crate::services::messaging::PushPayload;
use crate::services::notifications::{AudienceStats, DispatchOutcome, DispatchRequest};
use crate::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/send-notification", post(send_notification))
        .route("/api/notification-stats", get(notification_stats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendNotificationBody {
    title: Option<String>,
    body: Option<String>,
    target_type: Option<String>,
    target_users: Option<Vec<String>>,
    icon: Option<String>,
    badge: Option<String>,
    data: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct SendStats {
    total: u32,
    successful: u32,
    failed: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendNotificationResponse {
    success: bool,
    message_id: String,
    stats: SendStats,
}

#[derive(Serialize)]
struct NoRecipientsResponse {
    success: bool,
    error: String,
}

/// Resolve the audience and fan out one push per device token.
async fn send_notification(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendNotificationBody>,
) -> Result<Response> {
    let title = body.title.unwrap_or_default().trim().to_string();
    let text = body.body.unwrap_or_default().trim().to_string();
    if title.is_empty() || text.is_empty() {
        return Err(AppError::InvalidInput(
            "title and body are required".to_string(),
        ));
    }

    let request = DispatchRequest {
        payload: PushPayload {
            title,
            body: text,
            icon: body.icon,
            badge: body.badge,
            data: body.data,
            link: state.config.frontend_url.clone(),
        },
        target_type: body.target_type,
        target_users: body.target_users,
    };

    match state.notifications.dispatch(request).await? {
        DispatchOutcome::NoRecipients => Ok(Json(NoRecipientsResponse {
            success: false,
            error: "No users with notification tokens found".to_string(),
        })
        .into_response()),
        DispatchOutcome::Sent(stats) => Ok(Json(SendNotificationResponse {
            success: true,
            message_id: stats.message_id,
            stats: SendStats {
                total: stats.total,
                successful: stats.successful,
                failed: stats.failed,
            },
        })
        .into_response()),
    }
}

/// Audience counts for the notification admin UI.
async fn notification_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AudienceStats>> {
    Ok(Json(state.notifications.stats().await?))
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Push notification dispatch.
//!
//! Resolves an audience to device tokens and fans out one send per token.
//! Sends are independent: each outcome is captured, and a failed send never
//! aborts its siblings.

use crate::db::ProfileDb;
use crate::error::AppError;
use crate::models::{UserProfile, UserType};
use crate::services::messaging::{MessagingClient, PushPayload};
use futures_util::{stream, StreamExt};
use serde::Serialize;

const MAX_CONCURRENT_SENDS: usize = 50;
// Full device tokens never go to the logs.
const TOKEN_LOG_PREFIX_LEN: usize = 8;

/// Requested audience class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    All,
    Admin,
    User,
}

impl TargetType {
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw {
            None | Some("all") => Ok(TargetType::All),
            Some("admin") => Ok(TargetType::Admin),
            Some("user") => Ok(TargetType::User),
            Some(other) => Err(AppError::InvalidInput(format!(
                "Unknown targetType: {}",
                other
            ))),
        }
    }
}

/// A dispatch request after boundary validation.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub payload: PushPayload,
    pub target_type: Option<String>,
    pub target_users: Option<Vec<String>>,
}

/// Outcome of a dispatch.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// The audience resolved to zero device tokens; nothing was sent.
    NoRecipients,
    Sent(DispatchStats),
}

/// Aggregate counts for a completed dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchStats {
    pub message_id: String,
    pub total: u32,
    pub successful: u32,
    pub failed: u32,
}

/// Audience counts for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceStats {
    pub total_users: u32,
    pub users_with_notifications: u32,
    pub admins: u32,
    pub regular_users: u32,
}

/// Resolves audiences and fans out pushes.
#[derive(Clone)]
pub struct NotificationService {
    db: ProfileDb,
    messaging: MessagingClient,
}

impl NotificationService {
    pub fn new(db: ProfileDb, messaging: MessagingClient) -> Self {
        Self { db, messaging }
    }

    /// Resolve the audience and send to every device token found.
    pub async fn dispatch(&self, req: DispatchRequest) -> Result<DispatchOutcome, AppError> {
        let profiles = self
            .resolve_audience(req.target_users.as_deref(), req.target_type.as_deref())
            .await?;

        let tokens: Vec<String> = profiles
            .into_iter()
            .filter_map(|p| p.fcm_token)
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.is_empty() {
            tracing::info!("Notification dispatch found no recipients");
            return Ok(DispatchOutcome::NoRecipients);
        }

        let total = tokens.len() as u32;
        let payload = req.payload;

        let results: Vec<Result<String, AppError>> = stream::iter(tokens)
            .map(|token| {
                let messaging = self.messaging.clone();
                let payload = payload.clone();
                async move {
                    messaging.send_to_token(&token, &payload).await.map_err(|e| {
                        let prefix: String = token.chars().take(TOKEN_LOG_PREFIX_LEN).collect();
                        tracing::warn!(token_prefix = %prefix, error = %e, "Push send failed");
                        e
                    })
                }
            })
            .buffer_unordered(MAX_CONCURRENT_SENDS)
            .collect()
            .await;

        let successful = results.iter().filter(|r| r.is_ok()).count() as u32;
        let failed = total - successful;
        let message_id = format!("batch_{}", chrono::Utc::now().timestamp_millis());

        tracing::info!(
            message_id = %message_id,
            total,
            successful,
            failed,
            "Notification dispatch complete"
        );

        Ok(DispatchOutcome::Sent(DispatchStats {
            message_id,
            total,
            successful,
            failed,
        }))
    }

    /// Aggregate profile counts for the stats endpoint.
    pub async fn stats(&self) -> Result<AudienceStats, AppError> {
        let profiles = self.db.list_profiles().await?;

        let total_users = profiles.len() as u32;
        let users_with_notifications = profiles
            .iter()
            .filter(|p| p.fcm_token.as_deref().is_some_and(|t| !t.is_empty()))
            .count() as u32;
        let admins = profiles
            .iter()
            .filter(|p| p.user_type == Some(UserType::Admin))
            .count() as u32;
        let regular_users = profiles
            .iter()
            .filter(|p| p.user_type == Some(UserType::User))
            .count() as u32;

        Ok(AudienceStats {
            total_users,
            users_with_notifications,
            admins,
            regular_users,
        })
    }

    /// Explicit target list takes precedence; the type filter is ignored
    /// when one is present.
    async fn resolve_audience(
        &self,
        target_users: Option<&[String]>,
        target_type: Option<&str>,
    ) -> Result<Vec<UserProfile>, AppError> {
        if let Some(uids) = target_users {
            let uids: Vec<String> = uids
                .iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect();
            if !uids.is_empty() {
                return self.db.get_profiles_by_ids(&uids).await;
            }
        }

        match TargetType::parse(target_type)? {
            TargetType::All => self.db.list_profiles().await,
            TargetType::Admin => self.db.query_by_user_type(UserType::Admin).await,
            TargetType::User => self.db.query_by_user_type(UserType::User).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_type_parsing() {
        assert_eq!(TargetType::parse(None).unwrap(), TargetType::All);
        assert_eq!(TargetType::parse(Some("all")).unwrap(), TargetType::All);
        assert_eq!(TargetType::parse(Some("admin")).unwrap(), TargetType::Admin);
        assert_eq!(TargetType::parse(Some("user")).unwrap(), TargetType::User);
        assert!(matches!(
            TargetType::parse(Some("everyone")),
            Err(AppError::InvalidInput(_))
        ));
    }
}

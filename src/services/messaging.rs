// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FCM HTTP v1 client for push delivery.

use crate::error::AppError;
use crate::services::gcp_auth::ServiceAccountTokenProvider;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const FCM_URL: &str = "https://fcm.googleapis.com/v1";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Push content sent to each targeted device.
#[derive(Debug, Clone)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub data: Option<serde_json::Value>,
    /// Click-through link for web pushes.
    pub link: String,
}

/// Push-messaging gateway client.
#[derive(Clone)]
pub struct MessagingClient {
    mode: MessagingMode,
}

#[derive(Clone)]
enum MessagingMode {
    Rest(Arc<RestMessaging>),
    #[cfg(debug_assertions)]
    InMemory(Arc<tokio::sync::Mutex<MockMessagingState>>),
}

struct RestMessaging {
    http_client: reqwest::Client,
    base_url: String,
    project_id: String,
    tokens: Arc<ServiceAccountTokenProvider>,
}

#[derive(Deserialize)]
struct SendResponse {
    name: String,
}

impl MessagingClient {
    /// Create a production client against the FCM v1 API.
    pub fn new(
        project_id: &str,
        tokens: Arc<ServiceAccountTokenProvider>,
    ) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()?;

        Ok(Self {
            mode: MessagingMode::Rest(Arc::new(RestMessaging {
                http_client,
                base_url: FCM_URL.to_string(),
                project_id: project_id.to_string(),
                tokens,
            })),
        })
    }

    /// Create a recording in-memory client for integration tests.
    #[cfg(debug_assertions)]
    pub fn new_in_memory() -> Self {
        Self {
            mode: MessagingMode::InMemory(Arc::new(tokio::sync::Mutex::new(
                MockMessagingState::default(),
            ))),
        }
    }

    /// Send a push to a single device token. Returns the provider-assigned
    /// message name.
    pub async fn send_to_token(
        &self,
        token: &str,
        payload: &PushPayload,
    ) -> Result<String, AppError> {
        match &self.mode {
            MessagingMode::Rest(rest) => rest.send_to_token(token, payload).await,
            #[cfg(debug_assertions)]
            MessagingMode::InMemory(state) => {
                let mut state = state.lock().await;
                if state.fail_tokens.contains(token) {
                    return Err(AppError::Messaging("mock delivery failure".to_string()));
                }
                state.sent.push(SentMessage {
                    token: token.to_string(),
                    title: payload.title.clone(),
                });
                Ok(format!("projects/mock/messages/{}", state.sent.len()))
            }
        }
    }
}

impl RestMessaging {
    async fn send_to_token(&self, token: &str, payload: &PushPayload) -> Result<String, AppError> {
        let url = format!("{}/projects/{}/messages:send", self.base_url, self.project_id);

        let mut message = serde_json::Map::new();
        message.insert("token".to_string(), serde_json::json!(token));
        message.insert(
            "notification".to_string(),
            serde_json::json!({ "title": payload.title, "body": payload.body }),
        );
        if let Some(data) = &payload.data {
            message.insert("data".to_string(), stringify_data(data));
        }

        let mut webpush = serde_json::Map::new();
        let mut webpush_notification = serde_json::Map::new();
        if let Some(icon) = &payload.icon {
            webpush_notification.insert("icon".to_string(), serde_json::json!(icon));
        }
        if let Some(badge) = &payload.badge {
            webpush_notification.insert("badge".to_string(), serde_json::json!(badge));
        }
        if !webpush_notification.is_empty() {
            webpush.insert(
                "notification".to_string(),
                serde_json::Value::Object(webpush_notification),
            );
        }
        webpush.insert(
            "fcm_options".to_string(),
            serde_json::json!({ "link": payload.link }),
        );
        message.insert("webpush".to_string(), serde_json::Value::Object(webpush));

        let body = serde_json::json!({ "message": message });

        let access_token = self.tokens.access_token().await?;
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Messaging(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Messaging(format!("HTTP {}: {}", status, body)));
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| AppError::Messaging(format!("JSON parse error: {}", e)))?;

        Ok(sent.name)
    }
}

/// FCM data payloads must be string-to-string maps; coerce other JSON
/// values to their compact text form.
fn stringify_data(data: &serde_json::Value) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    if let serde_json::Value::Object(fields) = data {
        for (key, value) in fields {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            map.insert(key.clone(), serde_json::Value::String(text));
        }
    }
    serde_json::Value::Object(map)
}

// ─── Mock state (tests) ──────────────────────────────────────────

/// A push recorded by the in-memory client.
#[cfg(debug_assertions)]
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub token: String,
    pub title: String,
}

#[cfg(debug_assertions)]
#[derive(Default)]
struct MockMessagingState {
    sent: Vec<SentMessage>,
    fail_tokens: std::collections::HashSet<String>,
}

#[cfg(debug_assertions)]
impl MessagingClient {
    fn mock_state(&self) -> &Arc<tokio::sync::Mutex<MockMessagingState>> {
        match &self.mode {
            MessagingMode::InMemory(state) => state,
            MessagingMode::Rest(_) => panic!("mock helpers require an in-memory messaging client"),
        }
    }

    /// Mark a token so sends to it fail.
    pub async fn mock_fail_token(&self, token: &str) {
        self.mock_state().lock().await.fail_tokens.insert(token.to_string());
    }

    /// Snapshot the pushes recorded so far.
    pub async fn mock_sent(&self) -> Vec<SentMessage> {
        self.mock_state().lock().await.sent.clone()
    }
}

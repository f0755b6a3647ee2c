// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Service-account access tokens for Google REST APIs.
//!
//! Mints OAuth2 access tokens via the JWT-bearer grant and caches the
//! current token until shortly before expiry. Shared by the identity
//! gateway and the messaging client.

use crate::config::Config;
use crate::error::AppError;
use anyhow::Context;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const SCOPES: &str = "https://www.googleapis.com/auth/identitytoolkit \
                      https://www.googleapis.com/auth/firebase.messaging";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const EXPIRY_SKEW_SECS: i64 = 60;
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: chrono::DateTime<chrono::Utc>,
}

/// OAuth2 token provider backed by a service-account key.
pub struct ServiceAccountTokenProvider {
    http_client: reqwest::Client,
    client_email: String,
    key_id: String,
    encoding_key: EncodingKey,
    cache: RwLock<Option<CachedToken>>,
    refresh_lock: Mutex<()>,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

impl ServiceAccountTokenProvider {
    /// Build a provider from the configured service-account credentials.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(config.firebase_private_key.as_bytes())
            .context("invalid service-account private key")?;

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building token HTTP client")?;

        Ok(Self {
            http_client,
            client_email: config.firebase_client_email.clone(),
            key_id: config.firebase_private_key_id.clone(),
            encoding_key,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Get a valid access token, minting a fresh one when the cached token
    /// is absent or about to expire.
    pub async fn access_token(&self) -> Result<String, AppError> {
        if let Some(token) = self.cached().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while we waited on the lock.
        if let Some(token) = self.cached().await {
            return Ok(token);
        }

        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *self.cache.write().await = Some(fresh);

        Ok(token)
    }

    async fn cached(&self) -> Option<String> {
        let cache = self.cache.read().await;
        let cutoff = chrono::Utc::now() + chrono::Duration::seconds(EXPIRY_SKEW_SECS);
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > cutoff)
            .map(|entry| entry.token.clone())
    }

    async fn fetch_token(&self) -> Result<CachedToken, AppError> {
        let now = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: SCOPES,
            aud: TOKEN_URL,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key_id.clone());

        let assertion = encode(&header, &claims, &self.encoding_key).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to sign token assertion: {}", e))
        })?;

        let response = self
            .http_client
            .post(TOKEN_URL)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(anyhow::anyhow!(
                "Token exchange returned HTTP {}: {}",
                status,
                body
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Invalid token response JSON: {}", e))
        })?;

        tracing::debug!(
            expires_in = token.expires_in,
            "Service-account access token refreshed"
        );

        Ok(CachedToken {
            token: token.access_token,
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(token.expires_in),
        })
    }
}

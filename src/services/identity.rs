// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider gateway (Google Identity Toolkit).
//!
//! Handles:
//! - Account lookup by email
//! - Account creation with a temporary credential
//! - Password and custom-claims updates
//! - Local verification of client ID tokens against the provider JWKS

use crate::config::Config;
use crate::error::AppError;
use crate::services::gcp_auth::ServiceAccountTokenProvider;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const ID_TOKEN_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_JWKS_TTL: Duration = Duration::from_secs(3600);
const CLOCK_SKEW_SECS: u64 = 60;

/// Account record as seen by this service.
#[derive(Debug, Clone)]
pub struct IdentityUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Claims carried by a verified client ID token.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Custom claims attached to an identity.
///
/// A claims write replaces the provider-side map wholesale; claims not
/// listed here do not survive an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserClaims {
    pub must_change_password: bool,
}

/// Identity provider client.
#[derive(Clone)]
pub struct IdentityClient {
    mode: IdentityMode,
}

#[derive(Clone)]
enum IdentityMode {
    Rest(Arc<RestIdentity>),
    #[cfg(debug_assertions)]
    InMemory(Arc<InMemoryIdentity>),
}

struct RestIdentity {
    http_client: reqwest::Client,
    base_url: String,
    project_id: String,
    tokens: Arc<ServiceAccountTokenProvider>,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

impl IdentityClient {
    /// Create a production client against the Identity Toolkit API.
    pub fn new(
        config: &Config,
        tokens: Arc<ServiceAccountTokenProvider>,
    ) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()?;

        Ok(Self {
            mode: IdentityMode::Rest(Arc::new(RestIdentity {
                http_client,
                base_url: IDENTITY_TOOLKIT_URL.to_string(),
                project_id: config.firebase_project_id.clone(),
                tokens,
                jwks_cache: RwLock::new(None),
                refresh_lock: Mutex::new(()),
            })),
        })
    }

    /// Create a functioning in-memory client for integration tests.
    #[cfg(debug_assertions)]
    pub fn new_in_memory() -> Self {
        Self {
            mode: IdentityMode::InMemory(Arc::new(InMemoryIdentity::default())),
        }
    }

    /// Look up an account by email. Returns `None` on a miss.
    pub async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<IdentityUser>, AppError> {
        match &self.mode {
            IdentityMode::Rest(rest) => rest.find_user_by_email(email).await,
            #[cfg(debug_assertions)]
            IdentityMode::InMemory(mem) => mem.find_user_by_email(email).await,
        }
    }

    /// Create an account with the given email and temporary credential.
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentityUser, AppError> {
        match &self.mode {
            IdentityMode::Rest(rest) => rest.create_user(email, password).await,
            #[cfg(debug_assertions)]
            IdentityMode::InMemory(mem) => mem.create_user(email, password).await,
        }
    }

    /// Replace the stored credential for an existing account.
    pub async fn update_password(&self, uid: &str, password: &str) -> Result<(), AppError> {
        match &self.mode {
            IdentityMode::Rest(rest) => rest.update_password(uid, password).await,
            #[cfg(debug_assertions)]
            IdentityMode::InMemory(mem) => mem.update_password(uid, password).await,
        }
    }

    /// Replace the custom-claims map on an account.
    pub async fn set_claims(&self, uid: &str, claims: &UserClaims) -> Result<(), AppError> {
        match &self.mode {
            IdentityMode::Rest(rest) => rest.set_claims(uid, claims).await,
            #[cfg(debug_assertions)]
            IdentityMode::InMemory(mem) => mem.set_claims(uid, claims).await,
        }
    }

    /// Verify a client ID token and return its identity claims.
    pub async fn verify_id_token(&self, token: &str) -> Result<VerifiedIdentity, AppError> {
        match &self.mode {
            IdentityMode::Rest(rest) => rest.verify_id_token(token).await,
            #[cfg(debug_assertions)]
            IdentityMode::InMemory(mem) => mem.verify_id_token(token).await,
        }
    }
}

// ─── REST backend ────────────────────────────────────────────────

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<RawAccount>,
}

#[derive(Deserialize)]
struct RawAccount {
    #[serde(rename = "localId")]
    local_id: String,
    email: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct SignUpResponse {
    #[serde(rename = "localId")]
    local_id: String,
}

impl RestIdentity {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<IdentityUser>, AppError> {
        let url = format!(
            "{}/projects/{}/accounts:lookup",
            self.base_url, self.project_id
        );
        let body = serde_json::json!({ "email": [email] });

        let response: LookupResponse = self.post_json(&url, &body).await?;

        Ok(response.users.into_iter().next().map(|user| IdentityUser {
            uid: user.local_id,
            email: user.email.unwrap_or_else(|| email.to_string()),
            display_name: user.display_name,
        }))
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<IdentityUser, AppError> {
        let url = format!("{}/projects/{}/accounts", self.base_url, self.project_id);
        let body = serde_json::json!({ "email": email, "password": password });

        let response: SignUpResponse = self.post_json(&url, &body).await?;

        Ok(IdentityUser {
            uid: response.local_id,
            email: email.to_string(),
            display_name: None,
        })
    }

    async fn update_password(&self, uid: &str, password: &str) -> Result<(), AppError> {
        let url = format!(
            "{}/projects/{}/accounts:update",
            self.base_url, self.project_id
        );
        let body = serde_json::json!({ "localId": uid, "password": password });

        let _: serde_json::Value = self.post_json(&url, &body).await?;
        Ok(())
    }

    async fn set_claims(&self, uid: &str, claims: &UserClaims) -> Result<(), AppError> {
        let url = format!(
            "{}/projects/{}/accounts:update",
            self.base_url, self.project_id
        );
        let attributes = serde_json::to_string(claims)
            .map_err(|e| AppError::Identity(format!("Claims encoding failed: {}", e)))?;
        let body = serde_json::json!({ "localId": uid, "customAttributes": attributes });

        let _: serde_json::Value = self.post_json(&url, &body).await?;
        Ok(())
    }

    async fn verify_id_token(&self, token: &str) -> Result<VerifiedIdentity, AppError> {
        let header = decode_header(token).map_err(|_| AppError::InvalidToken)?;

        if header.alg != Algorithm::RS256 {
            return Err(AppError::InvalidToken);
        }

        let kid = header.kid.ok_or(AppError::InvalidToken)?;
        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let issuer = format!("https://securetoken.google.com/{}", self.project_id);
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<IdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|_| AppError::InvalidToken)?;

        Ok(VerifiedIdentity {
            uid: token_data.claims.sub,
            email: token_data.claims.email,
            name: token_data.claims.name,
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, AppError> {
        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        // An unknown kid after a forced refresh means the token was not
        // signed by the provider.
        Err(AppError::InvalidToken)
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), AppError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!("Refreshing identity provider JWKS cache");

        let response = self
            .http_client
            .get(ID_TOKEN_JWKS_URL)
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("JWKS request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Identity(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AppError::Identity(format!("Invalid JWKS JSON: {}", e)))?;

        let mut keys_by_kid: HashMap<String, Arc<DecodingKey>> = HashMap::new();

        for jwk in jwks.keys {
            if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
                continue;
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys_by_kid.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }

        if keys_by_kid.is_empty() {
            return Err(AppError::Identity(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + DEFAULT_JWKS_TTL,
        });

        Ok(())
    }

    /// POST with a bearer token and parse the JSON response.
    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<T, AppError> {
        let token = self.tokens.access_token().await?;

        let response = self
            .http_client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Identity(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Identity(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Identity(format!("JSON parse error: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

// ─── In-memory backend (tests) ───────────────────────────────────

/// Snapshot of a mock account, for test assertions.
#[cfg(debug_assertions)]
#[derive(Debug, Clone)]
pub struct MockIdentityRecord {
    pub uid: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    /// The full claims map as last written, or `None` if never written.
    pub claims: Option<serde_json::Value>,
}

/// Counters for provider calls issued against the mock.
#[cfg(debug_assertions)]
#[derive(Debug, Clone, Copy, Default)]
pub struct MockCallCounters {
    pub lookups: u32,
    pub creates: u32,
    pub password_updates: u32,
    pub claims_writes: u32,
}

#[cfg(debug_assertions)]
#[derive(Default)]
struct InMemoryState {
    users: Vec<MockIdentityRecord>,
    tokens: HashMap<String, VerifiedIdentity>,
    next_uid: u32,
    counters: MockCallCounters,
}

#[cfg(debug_assertions)]
#[derive(Default)]
struct InMemoryIdentity {
    state: Mutex<InMemoryState>,
}

#[cfg(debug_assertions)]
impl InMemoryIdentity {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<IdentityUser>, AppError> {
        let mut state = self.state.lock().await;
        state.counters.lookups += 1;
        Ok(state
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| IdentityUser {
                uid: u.uid.clone(),
                email: u.email.clone(),
                display_name: u.display_name.clone(),
            }))
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<IdentityUser, AppError> {
        let mut state = self.state.lock().await;
        state.counters.creates += 1;

        if state.users.iter().any(|u| u.email == email) {
            return Err(AppError::Identity("EMAIL_EXISTS".to_string()));
        }

        state.next_uid += 1;
        let uid = format!("mock-uid-{}", state.next_uid);
        state.users.push(MockIdentityRecord {
            uid: uid.clone(),
            email: email.to_string(),
            password: password.to_string(),
            display_name: None,
            claims: None,
        });

        Ok(IdentityUser {
            uid,
            email: email.to_string(),
            display_name: None,
        })
    }

    async fn update_password(&self, uid: &str, password: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.counters.password_updates += 1;

        let user = state
            .users
            .iter_mut()
            .find(|u| u.uid == uid)
            .ok_or_else(|| AppError::Identity("USER_NOT_FOUND".to_string()))?;
        user.password = password.to_string();
        Ok(())
    }

    async fn set_claims(&self, uid: &str, claims: &UserClaims) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.counters.claims_writes += 1;

        let value = serde_json::to_value(claims)
            .map_err(|e| AppError::Identity(format!("Claims encoding failed: {}", e)))?;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.uid == uid)
            .ok_or_else(|| AppError::Identity("USER_NOT_FOUND".to_string()))?;
        user.claims = Some(value);
        Ok(())
    }

    async fn verify_id_token(&self, token: &str) -> Result<VerifiedIdentity, AppError> {
        let state = self.state.lock().await;
        state
            .tokens
            .get(token)
            .cloned()
            .ok_or(AppError::InvalidToken)
    }
}

#[cfg(debug_assertions)]
impl IdentityClient {
    fn in_memory(&self) -> &InMemoryIdentity {
        match &self.mode {
            IdentityMode::InMemory(mem) => mem,
            IdentityMode::Rest(_) => panic!("mock helpers require an in-memory identity client"),
        }
    }

    /// Seed an existing account. Returns its uid.
    pub async fn mock_seed_user(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> String {
        let mem = self.in_memory();
        let mut state = mem.state.lock().await;
        state.next_uid += 1;
        let uid = format!("mock-uid-{}", state.next_uid);
        state.users.push(MockIdentityRecord {
            uid: uid.clone(),
            email: email.to_string(),
            password: password.to_string(),
            display_name: display_name.map(str::to_string),
            claims: None,
        });
        uid
    }

    /// Seed a bearer token resolving to the given identity claims.
    pub async fn mock_seed_token(
        &self,
        token: &str,
        uid: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) {
        let mem = self.in_memory();
        let mut state = mem.state.lock().await;
        state.tokens.insert(
            token.to_string(),
            VerifiedIdentity {
                uid: uid.to_string(),
                email: email.map(str::to_string),
                name: name.map(str::to_string),
            },
        );
    }

    /// Snapshot a mock account by email.
    pub async fn mock_user(&self, email: &str) -> Option<MockIdentityRecord> {
        let mem = self.in_memory();
        let state = mem.state.lock().await;
        state.users.iter().find(|u| u.email == email).cloned()
    }

    /// Number of mock accounts.
    pub async fn mock_user_count(&self) -> usize {
        let mem = self.in_memory();
        let state = mem.state.lock().await;
        state.users.len()
    }

    /// Snapshot the provider call counters.
    pub async fn mock_counters(&self) -> MockCallCounters {
        let mem = self.in_memory();
        let state = mem.state.lock().await;
        state.counters
    }
}

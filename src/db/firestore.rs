// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed profile operations.
//!
//! All writes are merges: only the fields named by a `ProfileUpdate` are
//! touched, and a merge against a missing document creates it with just
//! those fields.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{ProfileUpdate, UserProfile, UserType};
use futures_util::{stream, StreamExt};
#[cfg(debug_assertions)]
use std::collections::HashMap;
#[cfg(debug_assertions)]
use std::sync::Arc;

const MAX_CONCURRENT_DB_OPS: usize = 50;

#[cfg(debug_assertions)]
type MemStore = Arc<tokio::sync::RwLock<HashMap<String, serde_json::Value>>>;

/// Firestore database client.
#[derive(Clone)]
pub struct ProfileDb {
    client: Option<firestore::FirestoreDb>,
    #[cfg(debug_assertions)]
    mem: Option<MemStore>,
}

impl ProfileDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            #[cfg(debug_assertions)]
            mem: None,
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            #[cfg(debug_assertions)]
            mem: None,
        })
    }

    /// Create a mock client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            client: None,
            #[cfg(debug_assertions)]
            mem: None,
        }
    }

    /// Create a functioning in-memory client for integration tests.
    ///
    /// Documents are JSON objects; merges behave like Firestore update-mask
    /// writes (present fields only, creates missing documents).
    #[cfg(debug_assertions)]
    pub fn new_in_memory() -> Self {
        Self {
            client: None,
            mem: Some(Arc::new(tokio::sync::RwLock::new(HashMap::new()))),
        }
    }

    /// Insert a raw document, the way out-of-band writers (client apps
    /// registering device tokens) do.
    #[cfg(debug_assertions)]
    pub async fn mock_insert_doc(&self, uid: &str, doc: serde_json::Value) {
        let mem = self
            .mem
            .as_ref()
            .expect("mock helpers require an in-memory db");
        mem.write().await.insert(uid.to_string(), doc);
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Profile Operations ──────────────────────────────────────

    /// Get a profile by uid.
    pub async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        #[cfg(debug_assertions)]
        {
            if let Some(mem) = &self.mem {
                let docs = mem.read().await;
                return docs
                    .get(uid)
                    .cloned()
                    .map(|doc| {
                        serde_json::from_value(doc).map_err(|e| {
                            AppError::Database(format!("Profile decode failed: {}", e))
                        })
                    })
                    .transpose();
            }
        }

        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Merge fields into a profile document, creating it if absent.
    pub async fn merge_profile(&self, uid: &str, update: &ProfileUpdate) -> Result<(), AppError> {
        #[cfg(debug_assertions)]
        {
            if let Some(mem) = &self.mem {
                let patch = serde_json::to_value(update)
                    .map_err(|e| AppError::Database(format!("Profile encode failed: {}", e)))?;
                let mut docs = mem.write().await;
                let doc = docs
                    .entry(uid.to_string())
                    .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
                if let serde_json::Value::Object(patch) = patch {
                    if let serde_json::Value::Object(doc) = doc {
                        for (key, value) in patch {
                            doc.insert(key, value);
                        }
                    }
                }
                return Ok(());
            }
        }

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(update.field_paths())
            .in_col(collections::USERS)
            .document_id(uid)
            .object(update)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List every profile document.
    pub async fn list_profiles(&self) -> Result<Vec<UserProfile>, AppError> {
        #[cfg(debug_assertions)]
        {
            if let Some(mem) = &self.mem {
                let docs = mem.read().await;
                return docs
                    .values()
                    .cloned()
                    .map(|doc| {
                        serde_json::from_value(doc).map_err(|e| {
                            AppError::Database(format!("Profile decode failed: {}", e))
                        })
                    })
                    .collect();
            }
        }

        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Query profiles by role.
    pub async fn query_by_user_type(
        &self,
        user_type: UserType,
    ) -> Result<Vec<UserProfile>, AppError> {
        #[cfg(debug_assertions)]
        {
            if self.mem.is_some() {
                let profiles = self.list_profiles().await?;
                return Ok(profiles
                    .into_iter()
                    .filter(|p| p.user_type == Some(user_type))
                    .collect());
            }
        }

        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("userType").eq(user_type.as_str())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Fetch profiles for an explicit uid list.
    ///
    /// Uses concurrent reads with a limit to avoid overloading Firestore.
    /// Missing documents are dropped, not errors.
    pub async fn get_profiles_by_ids(&self, uids: &[String]) -> Result<Vec<UserProfile>, AppError> {
        #[cfg(debug_assertions)]
        {
            if self.mem.is_some() {
                let mut profiles = Vec::with_capacity(uids.len());
                for uid in uids {
                    if let Some(profile) = self.get_profile(uid).await? {
                        profiles.push(profile);
                    }
                }
                return Ok(profiles);
            }
        }

        let client = self.get_client()?;

        let results: Vec<Result<Option<UserProfile>, AppError>> = stream::iter(uids.to_vec())
            .map(|uid| async move {
                client
                    .fluent()
                    .select()
                    .by_id_in(collections::USERS)
                    .obj()
                    .one(&uid)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect()
            .await;

        let profiles = results
            .into_iter()
            .collect::<Result<Vec<Option<UserProfile>>, AppError>>()?;

        Ok(profiles.into_iter().flatten().collect())
    }
}

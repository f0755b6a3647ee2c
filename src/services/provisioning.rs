// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User provisioning and lifecycle transitions.
//!
//! Orchestrates the identity provider and the profile store to guarantee
//! an identity + profile pair exists with the requested role, and to flip
//! account status or product flags afterwards. The identity write and the
//! profile write are sequential and not atomic together; a profile-write
//! failure after an identity mutation leaves the identity as-is with no
//! rollback.

use crate::db::ProfileDb;
use crate::error::AppError;
use crate::models::{
    AccountStatus, AccountType, CreationEndpoint, ProfileUpdate, TripleHugger, UserType,
};
use crate::services::identity::{IdentityClient, UserClaims};
use rand::Rng;
use validator::ValidateEmail;

const TEMP_PASSWORD_LEN: usize = 12;
const TEMP_PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Inputs for a provisioning call.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Caller-supplied temporary credential. For an existing identity this
    /// is the only thing that rotates the stored password.
    pub temp_password: Option<String>,
    pub role: UserType,
    pub account_type: AccountType,
    pub endpoint: CreationEndpoint,
    pub created_by: String,
    /// When false, an already-known email is a conflict.
    pub allow_existing: bool,
}

/// Result of a provisioning call.
#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    pub uid: String,
    pub email: String,
    /// Present only when a credential was generated or rotated.
    pub temp_password: Option<String>,
}

/// Orchestrates identity + profile writes.
#[derive(Clone)]
pub struct ProvisioningService {
    identity: IdentityClient,
    db: ProfileDb,
}

impl ProvisioningService {
    pub fn new(identity: IdentityClient, db: ProfileDb) -> Self {
        Self { identity, db }
    }

    /// Ensure an identity + profile pair exists for the email, with the
    /// requested role and provenance.
    pub async fn provision(&self, req: ProvisionRequest) -> Result<ProvisionOutcome, AppError> {
        let email = req.email.trim().to_string();
        if !is_valid_email(&email) {
            return Err(AppError::InvalidInput(
                "A valid email address is required".to_string(),
            ));
        }

        let existing = self.identity.find_user_by_email(&email).await?;

        let mut issued_password: Option<String> = None;
        let mut created_identity = false;

        let (uid, existing_display_name) = match existing {
            Some(user) if !req.allow_existing => {
                tracing::info!(uid = %user.uid, "Provisioning refused: identity already exists");
                return Err(AppError::UserExists(user.uid));
            }
            Some(user) => {
                if let Some(password) = &req.temp_password {
                    self.identity.update_password(&user.uid, password).await?;
                    issued_password = Some(password.clone());
                }
                (user.uid, user.display_name)
            }
            None => {
                let password = req
                    .temp_password
                    .clone()
                    .unwrap_or_else(generate_temp_password);
                let user = self.identity.create_user(&email, &password).await?;
                created_identity = true;
                issued_password = Some(password);
                (user.uid, None)
            }
        };

        // Force a password change on next sign-in. The claims map is
        // replaced wholesale; claims outside this one do not survive.
        self.identity
            .set_claims(
                &uid,
                &UserClaims {
                    must_change_password: true,
                },
            )
            .await?;

        let display_name = compute_display_name(
            req.first_name.as_deref(),
            req.last_name.as_deref(),
            existing_display_name,
        );

        let now = chrono::Utc::now().to_rfc3339();
        let update = ProfileUpdate {
            uid: Some(uid.clone()),
            email: Some(email.clone()),
            user_type: Some(req.role),
            account_type: Some(req.account_type),
            account_status: Some(AccountStatus::Active),
            creation_endpoint: Some(req.endpoint),
            created_by: Some(req.created_by.clone()),
            first_name: non_empty(req.first_name),
            last_name: non_empty(req.last_name),
            display_name,
            temp_password: issued_password.clone(),
            password_generated_at: issued_password.as_ref().map(|_| now.clone()),
            created_at: created_identity.then(|| now.clone()),
            updated_at: Some(now),
            triple_hugger: None,
        };

        self.db.merge_profile(&uid, &update).await?;

        tracing::info!(
            uid = %uid,
            role = req.role.as_str(),
            endpoint = ?req.endpoint,
            created = created_identity,
            "User provisioned"
        );

        Ok(ProvisionOutcome {
            uid,
            email,
            temp_password: issued_password,
        })
    }

    /// Flip account status for a user identified by uid or email.
    ///
    /// Idempotent: repeating a transition only refreshes `updatedAt`.
    pub async fn set_status(
        &self,
        uid: Option<String>,
        email: Option<String>,
        status: AccountStatus,
    ) -> Result<String, AppError> {
        let uid = match (non_empty(uid), non_empty(email)) {
            (Some(uid), _) => uid,
            (None, Some(email)) => self.resolve_uid(&email).await?,
            (None, None) => {
                return Err(AppError::InvalidInput(
                    "Either uid or email is required".to_string(),
                ));
            }
        };

        let update = ProfileUpdate {
            account_status: Some(status),
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };
        self.db.merge_profile(&uid, &update).await?;

        tracing::info!(uid = %uid, status = status.as_str(), "Account status updated");
        Ok(uid)
    }

    /// Set the product classification flag for a user, found by email.
    pub async fn set_triple_hugger(
        &self,
        email: Option<String>,
        flag: TripleHugger,
    ) -> Result<String, AppError> {
        let email = non_empty(email).ok_or_else(|| {
            AppError::InvalidInput("A valid email address is required".to_string())
        })?;
        if !is_valid_email(&email) {
            return Err(AppError::InvalidInput(
                "A valid email address is required".to_string(),
            ));
        }

        let uid = self.resolve_uid(&email).await?;

        let update = ProfileUpdate {
            triple_hugger: Some(flag),
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };
        self.db.merge_profile(&uid, &update).await?;

        tracing::info!(uid = %uid, flag = ?flag, "Hugger flag updated");
        Ok(uid)
    }

    /// Clear the forced-password-change requirement on an identity.
    pub async fn clear_password_requirement(&self, uid: &str) -> Result<(), AppError> {
        if uid.trim().is_empty() {
            return Err(AppError::InvalidInput("uid is required".to_string()));
        }

        self.identity
            .set_claims(
                uid,
                &UserClaims {
                    must_change_password: false,
                },
            )
            .await?;

        tracing::info!(uid = %uid, "Password change requirement cleared");
        Ok(())
    }

    async fn resolve_uid(&self, email: &str) -> Result<String, AppError> {
        self.identity
            .find_user_by_email(email)
            .await?
            .map(|user| user.uid)
            .ok_or_else(|| AppError::NotFound(format!("No user found for email {}", email)))
    }
}

/// Generate a temporary password: fixed length over an alphanumeric
/// charset, drawn per-character from the OS CSPRNG.
pub fn generate_temp_password() -> String {
    let mut rng = rand::rngs::OsRng;
    (0..TEMP_PASSWORD_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..TEMP_PASSWORD_CHARSET.len());
            TEMP_PASSWORD_CHARSET[idx] as char
        })
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Display name: caller-supplied names win, then the identity's existing
/// display name, then nothing.
fn compute_display_name(
    first: Option<&str>,
    last: Option<&str>,
    existing: Option<String>,
) -> Option<String> {
    let joined = format!("{} {}", first.unwrap_or(""), last.unwrap_or(""));
    let joined = joined.trim();
    if !joined.is_empty() {
        return Some(joined.to_string());
    }
    existing.filter(|v| !v.trim().is_empty())
}

fn is_valid_email(email: &str) -> bool {
    if !email.validate_email() {
        return false;
    }
    // validate_email accepts dotless domains; require local@domain.tld.
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.contains('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_password_length_and_charset() {
        let password = generate_temp_password();
        assert_eq!(password.len(), TEMP_PASSWORD_LEN);
        assert!(password
            .bytes()
            .all(|b| TEMP_PASSWORD_CHARSET.contains(&b)));
    }

    #[test]
    fn temp_passwords_are_not_constant() {
        let a = generate_temp_password();
        let b = generate_temp_password();
        assert_ne!(a, b);
    }

    #[test]
    fn display_name_prefers_caller_names() {
        assert_eq!(
            compute_display_name(Some("Mary"), Some("Smith"), Some("Old Name".to_string())),
            Some("Mary Smith".to_string())
        );
        assert_eq!(
            compute_display_name(Some("Mary"), None, None),
            Some("Mary".to_string())
        );
        assert_eq!(
            compute_display_name(None, None, Some("Old Name".to_string())),
            Some("Old Name".to_string())
        );
        assert_eq!(compute_display_name(None, None, None), None);
        assert_eq!(
            compute_display_name(Some("  "), Some(""), Some("  ".to_string())),
            None
        );
    }

    #[test]
    fn email_validation_requires_dotted_domain() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("@example.com"));
    }
}

//! User profile document model.
//!
//! Profiles live in the `users` collection, keyed by the identity provider's
//! uid. Wire names are camelCase except `is_triple_hugger`, which predates
//! the naming convention and is kept as stored in production.

use serde::{Deserialize, Serialize};

/// Role of a user, as stored in `userType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Admin,
    User,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Admin => "admin",
            UserType::User => "user",
        }
    }
}

/// Commercial tier recorded at provisioning time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    Premium,
    Trial,
    #[serde(rename = "Admin-Created")]
    AdminCreated,
}

/// Two-state account lifecycle flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "Active",
            AccountStatus::Inactive => "Inactive",
        }
    }
}

/// Provenance tag recording which operation created or last provisioned
/// a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationEndpoint {
    GrantAdmin,
    CreateUser,
    GhlCreateUser,
    GhlCreateTrialUser,
}

/// Product classification flag, opaque to this service beyond storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripleHugger {
    Yes,
    No,
}

/// User profile as read from Firestore.
///
/// Every field is optional: merge-writes can create partial documents (a
/// status flip against an unknown uid leaves only `accountStatus` and
/// `updatedAt`), so reads must tolerate anything missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: Option<String>,
    pub email: Option<String>,
    pub user_type: Option<UserType>,
    pub account_type: Option<AccountType>,
    pub account_status: Option<AccountStatus>,
    pub creation_endpoint: Option<CreationEndpoint>,
    pub created_by: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub temp_password: Option<String>,
    pub password_generated_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// Device token registered by the client out-of-band.
    pub fcm_token: Option<String>,
    #[serde(rename = "is_triple_hugger")]
    pub triple_hugger: Option<TripleHugger>,
}

/// Fields to merge into a profile document.
///
/// `None` fields are excluded from both the serialized object and the
/// Firestore update mask, so a merge never clobbers fields it does not
/// mention. Timestamps are RFC 3339 strings stamped by the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_type: Option<AccountType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_status: Option<AccountStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_endpoint: Option<CreationEndpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_generated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(rename = "is_triple_hugger", skip_serializing_if = "Option::is_none")]
    pub triple_hugger: Option<TripleHugger>,
}

impl ProfileUpdate {
    /// Firestore field paths for the update mask: exactly the fields this
    /// update carries.
    pub fn field_paths(&self) -> Vec<String> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_paths_only_include_present_fields() {
        let update = ProfileUpdate {
            account_status: Some(AccountStatus::Inactive),
            updated_at: Some("2026-01-01T00:00:00+00:00".to_string()),
            ..Default::default()
        };

        let mut paths = update.field_paths();
        paths.sort();
        assert_eq!(paths, vec!["accountStatus", "updatedAt"]);
    }

    #[test]
    fn wire_names_match_production_documents() {
        let update = ProfileUpdate {
            uid: Some("u1".to_string()),
            user_type: Some(UserType::Admin),
            account_type: Some(AccountType::AdminCreated),
            account_status: Some(AccountStatus::Active),
            creation_endpoint: Some(CreationEndpoint::GrantAdmin),
            triple_hugger: Some(TripleHugger::Yes),
            ..Default::default()
        };

        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["userType"], "admin");
        assert_eq!(value["accountType"], "Admin-Created");
        assert_eq!(value["accountStatus"], "Active");
        assert_eq!(value["creationEndpoint"], "grant_admin");
        assert_eq!(value["is_triple_hugger"], "Yes");
    }

    #[test]
    fn profile_reads_tolerate_partial_documents() {
        let profile: UserProfile = serde_json::from_value(serde_json::json!({
            "accountStatus": "Inactive",
            "updatedAt": "2026-01-01T00:00:00+00:00"
        }))
        .unwrap();

        assert!(profile.uid.is_none());
        assert_eq!(profile.account_status, Some(AccountStatus::Inactive));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Account Record ---

/// Account
///
/// A user identity stored in the `users` table. Seed accounts are created once at startup;
/// afterwards the record belongs to the user-management handlers.
///
/// Invariants: `roles` is non-empty and `active_role` is one of `roles`. Use [`Account::new`]
/// to build one so both are checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    // Argon2id PHC string, never the plain secret.
    pub password_hash: String,
    pub roles: Vec<String>,
    pub active_role: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("account {id} must hold at least one role")]
    EmptyRoles { id: String },
    #[error("active role {active_role:?} is not granted to account {id}")]
    ActiveRoleNotGranted { id: String, active_role: String },
}

impl Account {
    /// Builds a validated account. Duplicate role tags are collapsed, first occurrence wins.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        phone: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        roles: impl IntoIterator<Item = impl Into<String>>,
        active_role: impl Into<String>,
    ) -> Result<Self, AccountError> {
        let mut unique: Vec<String> = Vec::new();
        for role in roles {
            let role = role.into();
            if !unique.contains(&role) {
                unique.push(role);
            }
        }

        let account = Self {
            id: id.into(),
            name: name.into(),
            phone: phone.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            roles: unique,
            active_role: active_role.into(),
        };
        account.validate()?;
        Ok(account)
    }

    /// Re-checks the role invariants, e.g. after loading a row written by another component.
    pub fn validate(&self) -> Result<(), AccountError> {
        if self.roles.is_empty() {
            return Err(AccountError::EmptyRoles {
                id: self.id.clone(),
            });
        }
        if !self.roles.iter().any(|role| role == &self.active_role) {
            return Err(AccountError::ActiveRoleNotGranted {
                id: self.id.clone(),
                active_role: self.active_role.clone(),
            });
        }
        Ok(())
    }

    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            roles: self.roles.clone(),
            active_role: self.active_role.clone(),
        }
    }
}

// --- Response Payloads (Output Schemas) ---

/// AccountProfile
///
/// Public view of an account (GET /api/users/{id}). The credential hash is never included.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub roles: Vec<String>,
    pub active_role: String,
}

/// PingResponse
///
/// Liveness payload for GET /api/ping. Independent of storage health.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PingResponse {
    #[schema(example = "ok")]
    pub status: String,
    #[ts(type = "string")]
    pub time: DateTime<Utc>,
}

/// ErrorEnvelope
///
/// Uniform JSON body for failures: `{msg, details?}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
pub struct ErrorEnvelope {
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub details: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            details: None,
        }
    }

    pub fn with_details(msg: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            details: Some(details.into()),
        }
    }
}

/// ApiMissResponse
///
/// Body of the 404 returned for any `/api` request no handler group resolved.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
pub struct ApiMissResponse {
    #[schema(example = "API endpoint not found")]
    pub msg: String,
    // Original path and query string.
    pub url: String,
    pub method: String,
}

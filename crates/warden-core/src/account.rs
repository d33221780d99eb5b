//! Account and profile records
//!
//! `Account` is the durable credential record. Its login-state fields
//! (`failed_login_attempts`, `locked_until`, `last_login`) are only ever
//! written through `CredentialStore::update_login_state`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User account record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Unique account identifier
    pub id: Uuid,

    /// Email address (unique, used for login)
    pub email: String,

    /// Argon2id PHC string; never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Optional wallet address supplied at registration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,

    /// Two-factor flag (enrollment is not implemented, always false)
    #[serde(default)]
    pub two_factor_enabled: bool,

    /// Whether the account may authenticate
    pub is_active: bool,

    /// Consecutive failed logins since the last success
    #[serde(skip_serializing, default)]
    pub failed_login_attempts: i32,

    /// Set when the failure counter crossed the lockout threshold
    #[serde(skip_serializing, default)]
    pub locked_until: Option<DateTime<Utc>>,

    /// Last successful login
    pub last_login: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Snapshot of the login-state fields
    pub fn login_state(&self) -> LoginState {
        LoginState {
            failed_attempts: self.failed_login_attempts,
            locked_until: self.locked_until,
            last_login: self.last_login,
        }
    }

    /// Apply a login-state write to this record
    pub fn apply_login_state(&mut self, state: &LoginState) {
        self.failed_login_attempts = state.failed_attempts;
        self.locked_until = state.locked_until;
        self.last_login = state.last_login;
    }
}

/// Parameters for creating an account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub wallet_address: Option<String>,
}

/// Login-state fields persisted after every password check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginState {
    pub failed_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

impl LoginState {
    /// State after a successful login at `now`
    pub fn after_success(now: DateTime<Utc>) -> Self {
        Self {
            failed_attempts: 0,
            locked_until: None,
            last_login: Some(now),
        }
    }
}

/// Profile attached to an account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a profile
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub country: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_account() -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            wallet_address: None,
            two_factor_enabled: false,
            is_active: true,
            failed_login_attempts: 3,
            locked_until: None,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_sensitive_fields_not_serialized() {
        let json = serde_json::to_string(&sample_account()).unwrap();
        assert!(json.contains("user@example.com"));
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("failed_login_attempts"));
        assert!(!json.contains("locked_until"));
    }

    #[test]
    fn test_after_success_resets_counter() {
        let now = Utc::now();
        let mut account = sample_account();
        account.locked_until = Some(now);

        account.apply_login_state(&LoginState::after_success(now));

        assert_eq!(account.failed_login_attempts, 0);
        assert_eq!(account.locked_until, None);
        assert_eq!(account.last_login, Some(now));
    }
}

//! Store capabilities
//!
//! `CredentialStore` holds durable account and profile records.
//! `SessionStore` is a key/value store with per-key TTL used for lockout
//! markers and refresh-token records.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::{Account, LoginState, NewAccount, NewProfile, Profile, Result};

/// Durable account storage
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find an account by its email address
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Find an account by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    /// Create an account.
    ///
    /// Returns `WardenError::Conflict` when the email is already registered.
    async fn create(&self, account: NewAccount) -> Result<Account>;

    /// Create the profile attached to an account
    async fn create_profile(&self, user_id: Uuid, profile: NewProfile) -> Result<Profile>;

    /// Find the profile attached to an account
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>>;

    /// Persist the login-state fields of an account
    async fn update_login_state(&self, id: Uuid, state: &LoginState) -> Result<()>;
}

/// Key/value storage with per-key expiry
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `value` under `key`, replacing any existing entry
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Read a live entry
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remove an entry. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

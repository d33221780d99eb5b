//! In-memory store adapters
//!
//! Used by tests and by single-node deployments without Redis. Session
//! entries expire lazily: an expired entry is evicted when it is next read.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::store::{CredentialStore, SessionStore};
use crate::{Account, LoginState, NewAccount, NewProfile, Profile, Result, WardenError};

/// In-memory credential store
#[derive(Default)]
pub struct InMemoryCredentialStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
    profiles: RwLock<HashMap<Uuid, Profile>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }

    /// Flip the active flag of an account
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| WardenError::NotFound(format!("account {id}")))?;
        account.is_active = active;
        account.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn create(&self, account: NewAccount) -> Result<Account> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|a| a.email == account.email) {
            return Err(WardenError::Conflict(format!(
                "email already registered: {}",
                account.email
            )));
        }

        let now = Utc::now();
        let record = Account {
            id: Uuid::new_v4(),
            email: account.email,
            password_hash: account.password_hash,
            wallet_address: account.wallet_address,
            two_factor_enabled: false,
            is_active: true,
            failed_login_attempts: 0,
            locked_until: None,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        accounts.insert(record.id, record.clone());
        Ok(record)
    }

    async fn create_profile(&self, user_id: Uuid, profile: NewProfile) -> Result<Profile> {
        if !self.accounts.read().await.contains_key(&user_id) {
            return Err(WardenError::NotFound(format!("account {user_id}")));
        }

        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(&user_id) {
            return Err(WardenError::Conflict(format!(
                "profile already exists for {user_id}"
            )));
        }

        let now = Utc::now();
        let record = Profile {
            user_id,
            username: profile.username,
            full_name: profile.full_name,
            country: profile.country,
            created_at: now,
            updated_at: now,
        };
        profiles.insert(user_id, record.clone());
        Ok(record)
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }

    async fn update_login_state(&self, id: Uuid, state: &LoginState) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| WardenError::NotFound(format!("account {id}")))?;
        account.apply_login_state(state);
        account.updated_at = Utc::now();
        Ok(())
    }
}

struct SessionEntry {
    value: String,
    expires_at: Instant,
}

/// In-memory session store with per-key deadlines
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, SessionEntry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, including expired ones not yet evicted
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let expires_at = Instant::now().checked_add(ttl).ok_or_else(|| {
            WardenError::SessionStoreError(format!("TTL out of range: {ttl:?}"))
        })?;
        let entry = SessionEntry {
            value: value.to_string(),
            expires_at,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: evict unless a writer replaced it in between
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
            entries.remove(key);
            tracing::trace!(key, "Evicted expired session entry");
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

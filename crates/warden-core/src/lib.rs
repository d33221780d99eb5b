//! Warden Core - Domain models, store capabilities, and shared types
//!
//! This crate defines the core abstractions used by the Warden credential service:
//! - Account and profile records
//! - The `CredentialStore` and `SessionStore` capabilities
//! - Store adapters (PostgreSQL, Redis, in-memory)
//! - Common error types
//! - Configuration management

pub mod account;
pub mod config;
pub mod credentials;
pub mod memory;
#[cfg(feature = "session-redis")]
pub mod session;
pub mod store;

pub use account::{Account, LoginState, NewAccount, NewProfile, Profile};
pub use config::{
    AppConfig, ConfigError, DatabaseConfig, LoggingConfig, PasswordHashConfig, SecurityConfig,
    ServerConfig, TokenConfig, MAX_DURATION_SECS,
};
pub use credentials::PgCredentialStore;
pub use memory::{InMemoryCredentialStore, InMemorySessionStore};
#[cfg(feature = "session-redis")]
pub use session::RedisSessionStore;
pub use store::{CredentialStore, SessionStore};

use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for store and configuration operations
#[derive(Error, Debug)]
pub enum WardenError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Session store error: {0}")]
    SessionStoreError(String),

    #[error("Store call exceeded its deadline of {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WardenError>;

impl From<ConfigError> for WardenError {
    fn from(err: ConfigError) -> Self {
        WardenError::ConfigError(err.to_string())
    }
}

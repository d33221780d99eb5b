//! Application state management

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use warden_core::{AppConfig, CredentialStore, SessionStore};

use crate::auth::{AuthError, AuthService, RequestAuthenticator};

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Registration, login, refresh and logout
    pub auth: Arc<AuthService>,
    /// Bearer-token resolution for protected routes
    pub authenticator: Arc<RequestAuthenticator>,
    /// Server start time
    pub start_time: Instant,
    /// Ready status
    is_ready: AtomicBool,
}

impl AppState {
    /// Wire the services over the given stores
    pub fn new(
        config: AppConfig,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, AuthError> {
        let auth = Arc::new(AuthService::new(&config, credentials.clone(), sessions)?);
        Ok(Self::from_services(config, auth, credentials))
    }

    /// Build state around an existing `AuthService`
    pub fn from_services(
        config: AppConfig,
        auth: Arc<AuthService>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let authenticator = Arc::new(RequestAuthenticator::new(auth.clone(), credentials));
        Self {
            config,
            auth,
            authenticator,
            start_time: Instant::now(),
            is_ready: AtomicBool::new(true),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }
}

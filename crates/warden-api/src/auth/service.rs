//! Authentication service layer
//!
//! Registration, password login with brute-force lockout, refresh-token
//! rotation and logout. Durable account state goes through a
//! `CredentialStore`; lockout markers and refresh-token records live in a
//! `SessionStore` with per-key TTL.
//!
//! The check-then-write sequences in `login` and `refresh` are not atomic.
//! Two concurrent refreshes with the same token can both succeed, and
//! concurrent failed logins can lose counter increments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;
use warden_core::{
    Account, AppConfig, CredentialStore, LoginState, NewAccount, NewProfile, Profile,
    SessionStore, WardenError, MAX_DURATION_SECS,
};

use super::error::AuthError;
use super::jwt::{AccessClaims, TokenIssuer};
use super::password::PasswordPolicy;
use crate::audit::{audit_log, AuditEvent};

const LOCK_KEY_PREFIX: &str = "login_lock:";
const REFRESH_KEY_PREFIX: &str = "refresh_token:";
const LOCK_MARKER: &str = "locked";

/// Session-store key of the lockout marker for `email`
pub fn lock_key(email: &str) -> String {
    format!("{LOCK_KEY_PREFIX}{email}")
}

/// Session-store key of a refresh-token record
pub fn refresh_key(fingerprint: &str) -> String {
    format!("{REFRESH_KEY_PREFIX}{fingerprint}")
}

/// Access token, refresh token and access expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry (Unix seconds)
    pub expires_at: i64,
}

/// Registration input
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub wallet_address: Option<String>,
    /// Profile fields; the username defaults to the email
    pub profile: NewProfile,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    /// Account with the login state written by this login
    pub account: Account,
}

/// Lockout and lifetime settings used by `AuthService`
#[derive(Debug, Clone, Copy)]
pub struct AuthSettings {
    pub max_login_attempts: i32,
    pub lockout_duration: Duration,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub store_timeout: Duration,
}

impl AuthSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_login_attempts: i32::try_from(config.security.max_login_attempts)
                .unwrap_or(i32::MAX),
            lockout_duration: config.security.lockout_duration(),
            access_ttl: config.token.access_ttl(),
            refresh_ttl: config.token.refresh_ttl(),
            store_timeout: config.security.store_timeout(),
        }
    }

    /// Cap every duration at `MAX_DURATION_SECS` so lock deadlines and
    /// record expiries stay representable
    pub fn bounded(self) -> Self {
        let cap = Duration::from_secs(MAX_DURATION_SECS);
        Self {
            lockout_duration: self.lockout_duration.min(cap),
            access_ttl: self.access_ttl.min(cap),
            refresh_ttl: self.refresh_ttl.min(cap),
            store_timeout: self.store_timeout.min(cap),
            ..self
        }
    }
}

/// Authentication service
///
/// Holds only immutable state and is shared behind `Arc`.
pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    passwords: PasswordPolicy,
    tokens: TokenIssuer,
    settings: AuthSettings,
}

impl AuthService {
    /// Build the service and its password policy and token issuer from config.
    ///
    /// The configuration is validated first; out-of-range durations are
    /// rejected here rather than at the first lockout.
    pub fn new(
        config: &AppConfig,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, AuthError> {
        config.validate().map_err(WardenError::from)?;
        let passwords = PasswordPolicy::new(&config.security.password_hash)?;
        let tokens = TokenIssuer::from_config(&config.token);
        Ok(Self::from_parts(
            credentials,
            sessions,
            passwords,
            tokens,
            AuthSettings::from_config(config),
        ))
    }

    pub fn from_parts(
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        passwords: PasswordPolicy,
        tokens: TokenIssuer,
        settings: AuthSettings,
    ) -> Self {
        Self {
            credentials,
            sessions,
            passwords,
            tokens,
            settings: settings.bounded(),
        }
    }

    pub fn passwords(&self) -> &PasswordPolicy {
        &self.passwords
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Register a new account.
    ///
    /// Rejects weak passwords and existing emails, then creates the account
    /// followed by its profile. A profile failure is returned as-is; the
    /// account is not rolled back.
    pub async fn register(&self, registration: Registration) -> Result<Account, AuthError> {
        let Registration {
            email,
            password,
            wallet_address,
            mut profile,
        } = registration;

        if let Err(err) = self.passwords.validate_strength(&password) {
            audit_log(&AuditEvent::RegistrationFailure {
                email,
                reason: "weak password".to_string(),
            });
            return Err(err);
        }

        if self
            .deadline(self.credentials.find_by_email(&email))
            .await?
            .is_some()
        {
            audit_log(&AuditEvent::RegistrationFailure {
                email,
                reason: "duplicate account".to_string(),
            });
            return Err(AuthError::DuplicateAccount);
        }

        let password_hash = self.hash_password(password).await?;

        let account = match self
            .deadline(self.credentials.create(NewAccount {
                email: email.clone(),
                password_hash,
                wallet_address,
            }))
            .await
        {
            Ok(account) => account,
            // Lost a race with a concurrent registration
            Err(WardenError::Conflict(_)) => {
                audit_log(&AuditEvent::RegistrationFailure {
                    email,
                    reason: "duplicate account".to_string(),
                });
                return Err(AuthError::DuplicateAccount);
            }
            Err(e) => return Err(e.into()),
        };

        if profile.username.is_none() {
            profile.username = Some(account.email.clone());
        }
        self.deadline(self.credentials.create_profile(account.id, profile))
            .await
            .inspect_err(|e| {
                tracing::error!(user_id = %account.id, error = %e, "Profile creation failed after account creation");
            })?;

        audit_log(&AuditEvent::RegistrationSuccess {
            user_id: account.id,
            email: account.email.clone(),
        });

        Ok(account)
    }

    /// Authenticate with email and password.
    ///
    /// While the lockout marker exists the attempt is refused without
    /// comparing the password or writing any state. Unknown emails cost one
    /// comparison against the dummy hash.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let lock_key = lock_key(email);
        if self.deadline(self.sessions.get(&lock_key)).await?.is_some() {
            audit_log(&AuditEvent::LockedLoginAttempt {
                email: email.to_string(),
            });
            return Err(AuthError::AccountLocked);
        }

        let Some(mut account) = self.deadline(self.credentials.find_by_email(email)).await? else {
            let _ = self.check_password(password, None).await?;
            audit_log(&AuditEvent::LoginFailure {
                email: email.to_string(),
                reason: "unknown email".to_string(),
                failed_attempts: None,
            });
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .check_password(password, Some(&account.password_hash))
            .await?
        {
            self.record_failure(&account, &lock_key).await?;
            return Err(AuthError::InvalidCredentials);
        }

        let state = LoginState::after_success(Utc::now());
        self.deadline(self.credentials.update_login_state(account.id, &state))
            .await?;
        account.apply_login_state(&state);

        let tokens = self.issue_pair(account.id, &account.email).await?;

        audit_log(&AuditEvent::LoginSuccess {
            user_id: account.id,
            email: account.email.clone(),
        });

        Ok(LoginOutcome { tokens, account })
    }

    /// Bump the failure counter, locking the account once it reaches the
    /// threshold. `locked_until` and `last_login` are otherwise kept.
    async fn record_failure(&self, account: &Account, lock_key: &str) -> Result<(), AuthError> {
        let failed_attempts = account.failed_login_attempts.saturating_add(1);
        let mut state = LoginState {
            failed_attempts,
            ..account.login_state()
        };

        if failed_attempts >= self.settings.max_login_attempts {
            // The marker gates login; write it before anything that can fail
            self.deadline(
                self.sessions
                    .set(lock_key, LOCK_MARKER, self.settings.lockout_duration),
            )
            .await?;

            let locked_until = chrono::Duration::from_std(self.settings.lockout_duration)
                .ok()
                .and_then(|lockout| Utc::now().checked_add_signed(lockout))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            state.locked_until = Some(locked_until);
            self.deadline(self.credentials.update_login_state(account.id, &state))
                .await?;

            audit_log(&AuditEvent::AccountLocked {
                user_id: account.id,
                email: account.email.clone(),
                failed_attempts,
                locked_until,
            });
        } else {
            self.deadline(self.credentials.update_login_state(account.id, &state))
                .await?;
        }

        audit_log(&AuditEvent::LoginFailure {
            email: account.email.clone(),
            reason: "invalid password".to_string(),
            failed_attempts: Some(failed_attempts),
        });
        Ok(())
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// The presented token is consumed; a second use is `TokenInvalid`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let key = refresh_key(&self.tokens.fingerprint(refresh_token));

        let Some(stored) = self.deadline(self.sessions.get(&key)).await? else {
            return Err(reject_refresh("unknown or expired refresh token"));
        };
        let Ok(user_id) = Uuid::parse_str(&stored) else {
            tracing::warn!("Refresh record holds an unparsable user id");
            return Err(reject_refresh("malformed refresh record"));
        };
        let Some(account) = self.deadline(self.credentials.find_by_id(user_id)).await? else {
            return Err(reject_refresh("account no longer exists"));
        };

        self.deadline(self.sessions.delete(&key)).await?;
        let tokens = self.issue_pair(account.id, &account.email).await?;

        audit_log(&AuditEvent::TokenRefresh {
            user_id: account.id,
        });
        Ok(tokens)
    }

    /// Revoke a refresh token. Unknown tokens are not an error.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let key = refresh_key(&self.tokens.fingerprint(refresh_token));

        let user_id = self
            .deadline(self.sessions.get(&key))
            .await?
            .and_then(|v| Uuid::parse_str(&v).ok());
        self.deadline(self.sessions.delete(&key)).await?;

        audit_log(&AuditEvent::Logout { user_id });
        Ok(())
    }

    /// Verify an access token
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        self.tokens.verify_access(token)
    }

    /// Fetch the profile of an account
    pub async fn profile(&self, user_id: Uuid) -> Result<Option<Profile>, AuthError> {
        Ok(self.deadline(self.credentials.find_profile(user_id)).await?)
    }

    /// Sign an access token, mint a refresh token and store its record
    async fn issue_pair(&self, user_id: Uuid, email: &str) -> Result<TokenPair, AuthError> {
        let (access_token, claims) = self.tokens.issue_access(
            user_id,
            email,
            self.tokens.issuer(),
            self.settings.access_ttl,
        )?;
        let refresh_token = self.tokens.issue_refresh();

        let key = refresh_key(&self.tokens.fingerprint(&refresh_token));
        self.deadline(
            self.sessions
                .set(&key, &user_id.to_string(), self.settings.refresh_ttl),
        )
        .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_at: claims.exp,
        })
    }

    /// Hash on the blocking pool
    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let passwords = self.passwords.clone();
        let hash = tokio::task::spawn_blocking(move || passwords.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("Password hashing task failed: {e}")))??;
        Ok(hash)
    }

    /// Compare on the blocking pool. `None` compares against the dummy hash,
    /// so unknown emails cost the same single comparison as known ones.
    async fn check_password(
        &self,
        password: &str,
        stored_hash: Option<&str>,
    ) -> Result<bool, AuthError> {
        let passwords = self.passwords.clone();
        let password = password.to_string();
        let stored_hash = stored_hash.map(str::to_string);

        tokio::task::spawn_blocking(move || {
            let hash = stored_hash
                .as_deref()
                .unwrap_or_else(|| passwords.dummy_hash());
            passwords.verify(&password, hash)
        })
        .await
        .map_err(|e| AuthError::Internal(format!("Password verification task failed: {e}")))
    }

    /// Run a store call under the configured deadline
    async fn deadline<T, F>(&self, call: F) -> warden_core::Result<T>
    where
        F: Future<Output = warden_core::Result<T>>,
    {
        let limit = self.settings.store_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?limit, "Store call timed out");
                Err(WardenError::Timeout(limit))
            }
        }
    }
}

fn reject_refresh(reason: &str) -> AuthError {
    audit_log(&AuditEvent::RefreshRejected {
        reason: reason.to_string(),
    });
    AuthError::TokenInvalid
}

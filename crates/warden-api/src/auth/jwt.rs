//! Access and refresh token handling
//!
//! Access tokens are HS256-signed JWTs carrying `AccessClaims`. Refresh
//! tokens are opaque random strings; only their fingerprint is ever stored.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;
use warden_core::TokenConfig;

use super::error::AuthError;

/// Number of random bytes in a refresh token (256 bits)
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// Claims embedded in an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Account ID
    pub user_id: Uuid,
    /// Account email at issue time
    pub email: String,
    /// Token issuer
    pub iss: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expires at (Unix seconds)
    pub exp: i64,
}

/// Signs and verifies access tokens, mints refresh tokens
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Create an issuer that signs with `secret` and only accepts tokens
    /// carrying `issuer`
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>) -> Self {
        let secret = secret.into();
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            secret,
            issuer: issuer.into(),
        }
    }

    pub fn from_config(config: &TokenConfig) -> Self {
        Self::new(config.secret.clone(), config.issuer.clone())
    }

    /// Issuer accepted by `verify_access`
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign an access token for `user_id`, valid for `ttl` from now
    pub fn issue_access(
        &self,
        user_id: Uuid,
        email: &str,
        issuer: &str,
        ttl: Duration,
    ) -> Result<(String, AccessClaims), AuthError> {
        let now = Utc::now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

        let claims = AccessClaims {
            user_id,
            email: email.to_string(),
            iss: issuer.to_string(),
            iat: now,
            exp: now.saturating_add(ttl_secs),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign access token: {e}")))?;

        Ok((token, claims))
    }

    /// Verify signature, structure, issuer and expiry.
    ///
    /// Every failure is `TokenInvalid`; the reason is only logged.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(reason = ?e.kind(), "Access token rejected");
                AuthError::TokenInvalid
            })
    }

    /// Mint an opaque refresh token: 32 random bytes, base64url without padding
    pub fn issue_refresh(&self) -> String {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Fingerprint of a refresh token under this issuer's secret
    pub fn fingerprint(&self, token: &str) -> String {
        fingerprint(token, &self.secret)
    }
}

/// Hex SHA-256 over `token` followed by `secret`
pub fn fingerprint(token: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

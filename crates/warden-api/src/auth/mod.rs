//! Credential and session lifecycle
//!
//! - `password`: Argon2id hashing, verification and strength rules
//! - `jwt`: access-token signing/verification, refresh-token minting
//! - `service`: registration, login with lockout, refresh rotation, logout
//! - `middleware`: bearer-token authentication at the request boundary

pub mod error;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;

pub use error::AuthError;
pub use jwt::{fingerprint, AccessClaims, TokenIssuer};
pub use middleware::{
    bearer_token, optional_auth, require_auth, AuthRejection, AuthenticatedUser,
    RequestAuthenticator,
};
pub use password::{validate_strength, PasswordError, PasswordPolicy};
pub use service::{AuthService, AuthSettings, LoginOutcome, Registration, TokenPair};

//! Authentication API handlers
//!
//! Registration, login, token refresh and logout are public. Profile and
//! account endpoints sit behind `require_auth` and read the identity from
//! request extensions.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;
use warden_core::{Account, NewProfile, Profile};

use crate::audit::client_span;
use crate::auth::{AuthError, AuthenticatedUser, Registration, TokenPair};
use crate::error::{AppError, ValidatedJson};
use crate::state::AppState;

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[validate(must_match(other = "password"))]
    pub confirm_password: String,
    pub wallet_address: Option<String>,
    /// Defaults to the email when omitted
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub country: Option<String>,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Refresh or logout request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// Registration response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: Uuid,
}

/// Public view of an account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    pub two_factor_enabled: bool,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for UserResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            wallet_address: account.wallet_address.clone(),
            two_factor_enabled: account.two_factor_enabled,
            is_active: account.is_active,
            last_login: account.last_login,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Login response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry (Unix seconds)
    pub expires_at: i64,
}

/// Profile response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            user_id: profile.user_id,
            username: profile.username,
            full_name: profile.full_name,
            country: profile.country,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

/// Plain message response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Register a new account
///
/// The password must be at least 8 characters and contain an uppercase
/// letter, a lowercase letter, a digit and one of `!@#$%^&*`.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = RegisterResponse),
        (status = 400, description = "Invalid input or weak password", body = crate::error::ApiError),
        (status = 409, description = "Account already exists", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let registration = Registration {
        email: request.email,
        password: request.password,
        wallet_address: request.wallet_address.filter(|w| !w.is_empty()),
        profile: NewProfile {
            username: request.username,
            full_name: request.full_name,
            country: request.country,
        },
    };

    let account = state
        .auth
        .register(registration)
        .instrument(client_span("register", &headers))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user_id: account.id,
        }),
    ))
}

/// Login with email and password
///
/// After the configured number of consecutive failures the account is
/// locked for the lockout duration and every attempt returns 423.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 423, description = "Account is locked", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .auth
        .login(&request.email, &request.password)
        .instrument(client_span("login", &headers))
        .await?;

    Ok(Json(LoginResponse {
        user: UserResponse::from(&outcome.account),
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token,
        expires_at: outcome.tokens.expires_at,
    }))
}

/// Exchange a refresh token for a new token pair
///
/// The presented refresh token is consumed.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed successfully", body = TokenPair),
        (status = 401, description = "Invalid refresh token", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let tokens = state
        .auth
        .refresh(&request.refresh_token)
        .instrument(client_span("refresh", &headers))
        .await
        .map_err(|e| match e {
            AuthError::TokenInvalid => AppError::Unauthorized("Invalid refresh token".to_string()),
            other => other.into(),
        })?;

    Ok(Json(tokens))
}

/// Revoke a refresh token
///
/// Succeeds for unknown tokens too.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .auth
        .logout(&request.refresh_token)
        .instrument(client_span("logout", &headers))
        .await?;

    Ok(Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// Get the profile of the authenticated account
#[utoipa::path(
    get,
    path = "/api/v1/auth/profile",
    tag = "auth",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 404, description = "Profile not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = state
        .auth
        .profile(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    Ok(Json(profile.into()))
}

/// Get the authenticated account
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current account", body = UserResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(Extension(user): Extension<AuthenticatedUser>) -> Json<UserResponse> {
    Json(UserResponse::from(&user.account))
}

/// Update profile (not implemented)
#[utoipa::path(
    put,
    path = "/api/v1/auth/profile",
    tag = "auth",
    responses((status = 501, description = "Not implemented", body = crate::error::ApiError)),
    security(("bearer_auth" = []))
)]
pub async fn update_profile_handler() -> AppError {
    AppError::NotImplemented
}

/// Change password (not implemented)
#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    tag = "auth",
    responses((status = 501, description = "Not implemented", body = crate::error::ApiError)),
    security(("bearer_auth" = []))
)]
pub async fn change_password_handler() -> AppError {
    AppError::NotImplemented
}

/// Enable two-factor authentication (not implemented)
#[utoipa::path(
    post,
    path = "/api/v1/auth/enable-2fa",
    tag = "auth",
    responses((status = 501, description = "Not implemented", body = crate::error::ApiError)),
    security(("bearer_auth" = []))
)]
pub async fn enable_2fa_handler() -> AppError {
    AppError::NotImplemented
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterRequest {
            email: "a@example.com".to_string(),
            password: "Good1!Abc".to_string(),
            confirm_password: "Good1!Abc".to_string(),
            wallet_address: None,
            username: None,
            full_name: None,
            country: None,
        };
        assert!(valid.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            ..valid.clone()
        };
        assert!(bad_email.validate().is_err());

        let mismatch = RegisterRequest {
            confirm_password: "Other1!Abc".to_string(),
            ..valid
        };
        assert!(mismatch.validate().is_err());
    }

    #[test]
    fn test_login_request_requires_password() {
        let request = LoginRequest {
            email: "a@example.com".to_string(),
            password: String::new(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_user_response_hides_credentials() {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            wallet_address: None,
            two_factor_enabled: false,
            is_active: true,
            failed_login_attempts: 2,
            locked_until: None,
            last_login: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&UserResponse::from(&account)).unwrap();
        assert!(json.contains("a@example.com"));
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("failed_login_attempts"));
    }
}

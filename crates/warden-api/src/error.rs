//! API error handling
//!
//! Every error body is `{"error": "<message>"}`. Infrastructure details are
//! logged and replaced with a generic message in the response.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;
use warden_core::WardenError;

use crate::auth::AuthError;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Human-readable message
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Auth(AuthError),
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    NotImplemented,
    Timeout,
    Internal(String),
}

impl AppError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            AppError::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::TokenInvalid => {
                    (StatusCode::UNAUTHORIZED, err.to_string())
                }
                AuthError::AccountLocked => (StatusCode::LOCKED, err.to_string()),
                AuthError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, msg),
                AuthError::DuplicateAccount => (StatusCode::CONFLICT, err.to_string()),
                AuthError::Store(e) => internal(&e.to_string()),
                AuthError::Internal(msg) => internal(&msg),
            },
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::NotImplemented => (StatusCode::NOT_IMPLEMENTED, "not implemented".to_string()),
            AppError::Timeout => (StatusCode::REQUEST_TIMEOUT, "Request timed out".to_string()),
            AppError::Internal(msg) => internal(&msg),
        }
    }
}

fn internal(detail: &str) -> (StatusCode, String) {
    tracing::error!(error = %detail, "Request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(ApiError::new(message))).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<WardenError> for AppError {
    fn from(err: WardenError) -> Self {
        AppError::Auth(AuthError::Store(err))
    }
}

/// JSON body extractor that also runs `validator` rules.
///
/// Malformed JSON and failed validation are both rejected with 400.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            tracing::debug!(error = %e, "Request body rejected");
            AppError::BadRequest("Invalid request body".to_string())
        })?;

        value.validate().map_err(|e| {
            tracing::debug!(error = %e, "Request validation failed");
            AppError::BadRequest(format!("Invalid request: {}", field_list(&e)))
        })?;

        Ok(ValidatedJson(value))
    }
}

fn field_list(errors: &validator::ValidationErrors) -> String {
    let mut fields: Vec<String> = errors
        .field_errors()
        .keys()
        .map(|k| k.to_string())
        .collect();
    fields.sort_unstable();
    fields.join(", ")
}

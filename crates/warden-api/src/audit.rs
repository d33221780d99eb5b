//! Security audit logging for credential and session events
//!
//! All audit events are logged at INFO level with the "audit" target so they
//! can be filtered and routed separately from application logs. Client
//! details (IP address, user agent) are not part of the events; handlers
//! attach them to the surrounding span via [`client_span`], and structured
//! subscribers emit span fields alongside every event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Span};
use uuid::Uuid;

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Account and profile created
    RegistrationSuccess { user_id: Uuid, email: String },

    /// Registration rejected
    RegistrationFailure { email: String, reason: String },

    /// Password accepted, token pair issued
    LoginSuccess { user_id: Uuid, email: String },

    /// Password rejected or unknown email
    LoginFailure {
        email: String,
        reason: String,
        failed_attempts: Option<i32>,
    },

    /// Failure counter crossed the threshold
    AccountLocked {
        user_id: Uuid,
        email: String,
        failed_attempts: i32,
        locked_until: DateTime<Utc>,
    },

    /// Login attempted while the lockout marker was present
    LockedLoginAttempt { email: String },

    /// Refresh token rotated
    TokenRefresh { user_id: Uuid },

    /// Refresh token not accepted
    RefreshRejected { reason: String },

    /// Refresh token revoked
    Logout { user_id: Option<Uuid> },

    /// Bearer token rejected at the request boundary
    InvalidToken { reason: String },
}

impl AuditEvent {
    /// Stable event name, matching the serialized `event_type`
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "registration_success",
            AuditEvent::RegistrationFailure { .. } => "registration_failure",
            AuditEvent::LoginSuccess { .. } => "login_success",
            AuditEvent::LoginFailure { .. } => "login_failure",
            AuditEvent::AccountLocked { .. } => "account_locked",
            AuditEvent::LockedLoginAttempt { .. } => "locked_login_attempt",
            AuditEvent::TokenRefresh { .. } => "token_refresh",
            AuditEvent::RefreshRejected { .. } => "refresh_rejected",
            AuditEvent::Logout { .. } => "logout",
            AuditEvent::InvalidToken { .. } => "invalid_token",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::AccountLocked { .. } => "Account locked",
            AuditEvent::LockedLoginAttempt { .. } => "Login attempt on locked account",
            AuditEvent::TokenRefresh { .. } => "Token refresh",
            AuditEvent::RefreshRejected { .. } => "Refresh rejected",
            AuditEvent::Logout { .. } => "User logout",
            AuditEvent::InvalidToken { .. } => "Invalid token",
        }
    }
}

/// Log a security audit event with structured fields
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    info!(
        target: "audit",
        timestamp = %timestamp,
        event_type = event.kind(),
        event = %event_json,
        "{}",
        event.message()
    );
}

/// Span carrying client details for everything logged while handling a request
pub fn client_span(operation: &'static str, headers: &axum::http::HeaderMap) -> Span {
    info_span!(
        "client",
        operation,
        ip_address = ?extract_ip_address(headers),
        user_agent = ?extract_user_agent(headers),
    )
}

/// Extract the client IP address from proxy headers.
///
/// Checks X-Forwarded-For (first hop), then X-Real-IP.
pub fn extract_ip_address(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = xff.split(',').next().map(str::trim).filter(|s| !s.is_empty()) {
            return Some(first.to_string());
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
}

/// Extract the user agent from request headers
pub fn extract_user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

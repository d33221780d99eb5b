/// Request authentication for protected routes
///
/// Resolves a bearer access token to a live account. On success the typed
/// `AuthenticatedUser` is added to the request extensions, where handlers
/// pick it up with `Extension<AuthenticatedUser>`.
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;
use warden_core::{Account, CredentialStore};

use super::service::AuthService;
use crate::audit::{audit_log, client_span, AuditEvent};

/// Identity attached to an authenticated request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Account ID from the verified token
    pub user_id: Uuid,
    /// Account as re-fetched for this request
    pub account: Account,
}

/// Reasons a request is refused at the authentication boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthRejection {
    #[error("no auth header")]
    MissingHeader,

    #[error("invalid format")]
    InvalidFormat,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("user not found or inactive")]
    UnknownOrInactive,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Resolves bearer tokens to accounts
pub struct RequestAuthenticator {
    auth: Arc<AuthService>,
    credentials: Arc<dyn CredentialStore>,
}

impl RequestAuthenticator {
    pub fn new(auth: Arc<AuthService>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { auth, credentials }
    }

    /// Authenticate from request headers.
    ///
    /// The account is re-fetched on every request, so deactivation takes
    /// effect immediately even for tokens that have not expired.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
    ) -> Result<AuthenticatedUser, AuthRejection> {
        let token = bearer_token(headers)?;

        let claims = self
            .auth
            .verify_access(token)
            .map_err(|_| AuthRejection::InvalidToken)?;

        let timeout = self.auth.settings().store_timeout;
        let account = match tokio::time::timeout(timeout, self.credentials.find_by_id(claims.user_id))
            .await
        {
            Ok(Ok(account)) => account,
            Ok(Err(e)) => {
                tracing::warn!(user_id = %claims.user_id, error = %e, "Account lookup failed during authentication");
                None
            }
            Err(_) => {
                tracing::warn!(user_id = %claims.user_id, ?timeout, "Account lookup timed out during authentication");
                None
            }
        };

        match account {
            Some(account) if account.is_active => Ok(AuthenticatedUser {
                user_id: claims.user_id,
                account,
            }),
            _ => Err(AuthRejection::UnknownOrInactive),
        }
    }

    /// Like `authenticate`, but any failure yields an anonymous request
    pub async fn authenticate_optional(&self, headers: &HeaderMap) -> Option<AuthenticatedUser> {
        self.authenticate(headers).await.ok()
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively and exactly one token must follow.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthRejection> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthRejection::MissingHeader)?
        .to_str()
        .map_err(|_| AuthRejection::InvalidFormat)?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthRejection::InvalidFormat),
    }
}

/// Middleware that rejects unauthenticated requests with 401
pub async fn require_auth(
    State(authenticator): State<Arc<RequestAuthenticator>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let span = client_span("authenticate", request.headers());

    let result = authenticator
        .authenticate(request.headers())
        .instrument(span.clone())
        .await;

    match result {
        Ok(user) => {
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        Err(rejection) => {
            span.in_scope(|| {
                audit_log(&AuditEvent::InvalidToken {
                    reason: rejection.to_string(),
                })
            });
            Err(rejection)
        }
    }
}

/// Middleware that attaches the identity when present and never rejects
pub async fn optional_auth(
    State(authenticator): State<Arc<RequestAuthenticator>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(user) = authenticator.authenticate_optional(request.headers()).await {
        request.extensions_mut().insert(user);
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Registration;
    use axum::{body::Body, http::HeaderValue, middleware, routing::get, Extension, Router};
    use tower::ServiceExt;
    use warden_core::{
        AppConfig, InMemoryCredentialStore, InMemorySessionStore, PasswordHashConfig,
    };

    const PASSWORD: &str = "Good1!Abc";

    struct Fixture {
        authenticator: Arc<RequestAuthenticator>,
        credentials: Arc<InMemoryCredentialStore>,
        access_token: String,
        user_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let mut config = AppConfig::default();
        config.token.secret = "middleware-test-secret".to_string();
        config.security.password_hash = PasswordHashConfig {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        };

        let credentials = Arc::new(InMemoryCredentialStore::new());
        let store: Arc<dyn CredentialStore> = credentials.clone();
        let auth = Arc::new(
            AuthService::new(&config, store.clone(), Arc::new(InMemorySessionStore::new()))
                .unwrap(),
        );

        let account = auth
            .register(Registration {
                email: "mw@example.com".to_string(),
                password: PASSWORD.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let outcome = auth.login("mw@example.com", PASSWORD).await.unwrap();

        Fixture {
            authenticator: Arc::new(RequestAuthenticator::new(auth, store)),
            credentials,
            access_token: outcome.tokens.access_token,
            user_id: account.id,
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def")), Ok("abc.def"));
        assert_eq!(bearer_token(&headers_with("bearer abc")), Ok("abc"));
        assert_eq!(bearer_token(&headers_with("BEARER abc")), Ok("abc"));
    }

    #[test]
    fn test_bearer_token_rejections() {
        assert_eq!(
            bearer_token(&HeaderMap::new()),
            Err(AuthRejection::MissingHeader)
        );
        for bad in ["Bearer", "Bearer a b", "Basic abc", "abc", ""] {
            assert_eq!(
                bearer_token(&headers_with(bad)),
                Err(AuthRejection::InvalidFormat),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(AuthRejection::MissingHeader.to_string(), "no auth header");
        assert_eq!(AuthRejection::InvalidFormat.to_string(), "invalid format");
        assert_eq!(
            AuthRejection::InvalidToken.to_string(),
            "invalid or expired token"
        );
        assert_eq!(
            AuthRejection::UnknownOrInactive.to_string(),
            "user not found or inactive"
        );
    }

    #[tokio::test]
    async fn test_authenticate_resolves_account() {
        let fx = fixture().await;

        let user = fx
            .authenticator
            .authenticate(&bearer(&fx.access_token))
            .await
            .unwrap();

        assert_eq!(user.user_id, fx.user_id);
        assert_eq!(user.account.email, "mw@example.com");
    }

    #[tokio::test]
    async fn test_authenticate_rejects_bad_token_and_inactive_account() {
        let fx = fixture().await;

        let result = fx.authenticator.authenticate(&bearer("not.a.jwt")).await;
        assert_eq!(result.unwrap_err(), AuthRejection::InvalidToken);

        fx.credentials.set_active(fx.user_id, false).await.unwrap();
        let result = fx
            .authenticator
            .authenticate(&bearer(&fx.access_token))
            .await;
        assert_eq!(result.unwrap_err(), AuthRejection::UnknownOrInactive);
    }

    #[tokio::test]
    async fn test_optional_auth_never_rejects() {
        let fx = fixture().await;
        assert!(fx
            .authenticator
            .authenticate_optional(&HeaderMap::new())
            .await
            .is_none());

        let app = Router::new()
            .route(
                "/whoami",
                get(|user: Option<Extension<AuthenticatedUser>>| async move {
                    user.map(|Extension(u)| u.account.email)
                        .unwrap_or_else(|| "anonymous".to_string())
                }),
            )
            .layer(middleware::from_fn_with_state(
                fx.authenticator.clone(),
                optional_auth,
            ));

        for (auth_header, expected) in [
            (Some(format!("Bearer {}", fx.access_token)), "mw@example.com"),
            (Some("Bearer garbage".to_string()), "anonymous"),
            (None, "anonymous"),
        ] {
            let mut builder = axum::http::Request::builder().uri("/whoami");
            if let Some(value) = auth_header {
                builder = builder.header(header::AUTHORIZATION, value);
            }
            let response = app
                .clone()
                .oneshot(builder.body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(body, expected.as_bytes());
        }
    }
}

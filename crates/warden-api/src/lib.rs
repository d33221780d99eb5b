//! Warden API - REST surface for the credential and session lifecycle
//!
//! Public endpoints handle registration, login, token refresh and logout.
//! Everything else under `/api/v1/auth` requires a bearer access token.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod headers;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::{
    error_handling::HandleErrorLayer,
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    BoxError, Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use warden_core::ServerConfig;

use crate::error::AppError;
use crate::state::AppState;

/// How long in-flight requests may drain after a shutdown signal
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let server = &state.config.server;
    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(server))
        .layer(middleware::from_fn(headers::security_headers_middleware))
        .layer(HandleErrorLayer::new(handle_middleware_error))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs,
        )));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .nest("/api/v1", routes::api_routes(&state))
        .layer(middleware_stack)
        .with_state(state)
}

/// Turn errors from fallible tower layers into `{"error": ...}` responses
async fn handle_middleware_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::Timeout
    } else {
        AppError::Internal(err.to_string())
    }
}

/// CORS restricted to the configured origins
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Serve until `shutdown` resolves, then let in-flight requests finish.
///
/// Connections still open after `grace_period` are dropped.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    shutdown: F,
    grace_period: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown.await;
        let _ = signalled_tx.send(());
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => return flatten(joined),
        _ = signalled_rx => {}
    }

    tracing::info!(?grace_period, "Shutdown signal received, draining connections");
    match tokio::time::timeout(grace_period, &mut server).await {
        Ok(joined) => flatten(joined),
        Err(_) => {
            tracing::warn!("Grace period elapsed, dropping remaining connections");
            server.abort();
            Ok(())
        }
    }
}

fn flatten(joined: Result<std::io::Result<()>, tokio::task::JoinError>) -> std::io::Result<()> {
    joined.map_err(std::io::Error::other)?
}

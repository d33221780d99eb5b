//! OpenAPI document

use axum::Json;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::auth::TokenPair;
use crate::error::ApiError;
use crate::handlers::{auth, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Warden API",
        description = "Credential and session lifecycle service"
    ),
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::refresh_handler,
        auth::logout_handler,
        auth::get_profile_handler,
        auth::update_profile_handler,
        auth::change_password_handler,
        auth::enable_2fa_handler,
        auth::me_handler,
        health::health_check,
        health::readiness_check,
    ),
    components(schemas(
        ApiError,
        TokenPair,
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::RefreshRequest,
        auth::RegisterResponse,
        auth::LoginResponse,
        auth::UserResponse,
        auth::ProfileResponse,
        auth::MessageResponse,
        health::HealthResponse,
        health::ReadinessResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration, login and token lifecycle"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` security scheme used by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Serve the OpenAPI document as JSON
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

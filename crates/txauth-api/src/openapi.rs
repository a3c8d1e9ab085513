//! OpenAPI document
//!
//! Served as JSON at `/api-docs/openapi.json`.

use crate::error::ApiError;
use crate::handlers::{auth, health, users};
use crate::models::{
    AccountView, LoginRequest, LoginResponse, MessageResponse, RegisterRequest, UserInfo, UserView,
};
use axum::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness_check,
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        users::list_users,
        users::get_user,
        users::upgrade_user,
    ),
    components(schemas(
        ApiError,
        RegisterRequest,
        LoginRequest,
        LoginResponse,
        MessageResponse,
        UserView,
        UserInfo,
        AccountView,
        health::HealthResponse,
        health::ReadinessResponse,
        health::ReadinessChecks,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration and sessions"),
        (name = "users", description = "User directory"),
        (name = "health", description = "Probes"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
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

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).unwrap();

        assert!(json["paths"]["/api/v1/auth/login"]["post"].is_object());
        assert!(json["paths"]["/api/v1/users/{id}"]["get"].is_object());
        assert!(json["components"]["securitySchemes"]["bearer_auth"].is_object());
    }
}

use utoipa::OpenApi;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Scholar Weekly API",
        version = "1.0.0",
        description = "Account management for Scholar Weekly.\n\n**Authentication:** every `/api/v1/user/{id}` route requires a JWT Bearer token issued by login or signup, and only for the token's own user.\n\n**Digest:** subscribed users receive one arXiv paper per week matched against three of their interests.",
    ),
    paths(
        crate::api::health::health_check,

        crate::api::users::signup,
        crate::api::users::login,
        crate::api::users::get_user,
        crate::api::users::update_user,
        crate::api::users::delete_user,
        crate::api::users::subscribe,
        crate::api::users::unsubscribe,
        crate::api::users::send_digest_now,
    ),
    components(
        schemas(
            crate::api::health::HealthResponse,

            crate::models::SignupRequest,
            crate::models::LoginRequest,
            crate::models::AuthResponse,
            crate::models::UserResponse,
            crate::models::UpdateUserRequest,
            crate::models::SubscribeRequest,
        )
    ),
    tags(
        (name = "Health", description = "Service and database health."),
        (name = "User", description = "Signup, login, profile and digest subscription."),
        (name = "Digest", description = "Manual trigger for the weekly paper digest."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token returned by /api/v1/user/login"))
                        .build()
                ),
            );
        }
    }
}

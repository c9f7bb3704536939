use crate::{config::AppConfig, services::auth_service};
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};

pub use crate::services::auth_service::Claims;

/// Requires `Authorization: Bearer <jwt>`; verified claims go into request extensions.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .map(str::to_string);

        let token = match token {
            Some(token) => token,
            None => {
                return Box::pin(async move {
                    Err(actix_web::error::ErrorUnauthorized("Missing authorization token"))
                });
            }
        };

        let config = match req.app_data::<web::Data<AppConfig>>() {
            Some(config) => config.clone(),
            None => {
                log::error!("❌ AppConfig missing from app data, cannot verify tokens");
                return Box::pin(async move {
                    Err(actix_web::error::ErrorInternalServerError("Server misconfigured"))
                });
            }
        };

        match auth_service::verify_token(&token, &config.jwt) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
                let fut = self.service.call(req);
                Box::pin(async move {
                    let res = fut.await?;
                    Ok(res)
                })
            }
            Err(e) => {
                log::warn!("❌ Rejected token: {}", e);
                Box::pin(async move {
                    Err(actix_web::error::ErrorUnauthorized("Invalid or expired token"))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DigestConfig, JwtConfig, MailConfig};
    use actix_web::{http::StatusCode, test as actix_test, App, HttpResponse};

    fn config() -> AppConfig {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: "0".to_string(),
            database_url: "mongodb://localhost:27017/test".to_string(),
            bcrypt_cost: 4,
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                issuer: "scholar-weekly".to_string(),
                audience: "scholar-weekly-api".to_string(),
                expiration_hours: 1,
            },
            digest: DigestConfig::default(),
            mail: MailConfig::default(),
        }
    }

    async fn whoami(claims: web::ReqData<Claims>) -> HttpResponse {
        HttpResponse::Ok().body(claims.sub.clone())
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
    }

    #[actix_web::test]
    async fn test_missing_token_is_unauthorized() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config()))
                .service(web::resource("/me").wrap(AuthMiddleware).route(web::get().to(whoami))),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/me").to_request();
        let err = actix_test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_valid_token_reaches_handler_with_claims() {
        let config = config();
        let token = auth_service::generate_jwt("65f1c0ffee0000000000abcd", "ada@example.com", &config.jwt)
            .unwrap();

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .service(web::resource("/me").wrap(AuthMiddleware).route(web::get().to(whoami))),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, "65f1c0ffee0000000000abcd".as_bytes());
    }

    #[actix_web::test]
    async fn test_garbage_token_is_unauthorized() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config()))
                .service(web::resource("/me").wrap(AuthMiddleware).route(web::get().to(whoami))),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", "Bearer not.a.jwt"))
            .to_request();
        let err = actix_test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }
}

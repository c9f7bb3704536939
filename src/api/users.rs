use crate::{
    config::AppConfig,
    database::MongoDB,
    middleware::auth::Claims,
    models::{AuthResponse, LoginRequest, SignupRequest, SubscribeRequest, UpdateUserRequest, UserResponse},
    services::{auth_service, digest_service::DigestDispatcher, user_service},
    utils::AppError,
};
use actix_web::{web, HttpResponse};

pub fn error_response(e: &AppError) -> HttpResponse {
    HttpResponse::build(e.status_code()).json(serde_json::json!({
        "success": false,
        "error": e.to_string()
    }))
}

/// Malformed ids are 404 before ownership is considered
fn authorize(claims: &Claims, id: &str) -> Result<(), AppError> {
    user_service::validate_user_id(id)?;
    ensure_owner(claims, id)
}

/// A token only grants access to its own user record
fn ensure_owner(claims: &Claims, id: &str) -> Result<(), AppError> {
    if claims.sub == id {
        Ok(())
    } else {
        Err(AppError::Forbidden("Token does not belong to this user".to_string()))
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/user/signup",
    tag = "User",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created", body = AuthResponse),
        (status = 400, description = "Invalid request or passwords don't match"),
        (status = 409, description = "User already exists")
    )
)]
pub async fn signup(
    db: web::Data<MongoDB>,
    config: web::Data<AppConfig>,
    request: web::Json<SignupRequest>,
) -> HttpResponse {
    log::info!("📝 POST /user/signup - email: {}", request.email);

    match auth_service::signup(&db, &request, &config).await {
        Ok(response) => HttpResponse::Created().json(response),
        Err(e) => {
            log::warn!("❌ Signup failed: {} - {}", request.email, e);
            error_response(&e)
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/user/login",
    tag = "User",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 404, description = "User does not exist")
    )
)]
pub async fn login(
    db: web::Data<MongoDB>,
    config: web::Data<AppConfig>,
    request: web::Json<LoginRequest>,
) -> HttpResponse {
    log::info!("🔐 POST /user/login - email: {}", request.email);

    match auth_service::login(&db, &request, &config).await {
        Ok(response) => {
            log::info!("✅ Login successful: {}", request.email);
            HttpResponse::Ok().json(response)
        }
        Err(e) => {
            log::warn!("❌ Login failed: {} - {}", request.email, e);
            error_response(&e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/user/{id}",
    tag = "User",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 404, description = "No user with this id")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    log::info!("👤 GET /user/{}", id);

    let result = async {
        authorize(&claims, &id)?;
        user_service::get_user(&db, &id).await
    }
    .await;

    match result {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(e) => error_response(&e),
    }
}

#[utoipa::path(
    patch,
    path = "/api/v1/user/{id}",
    tag = "User",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 404, description = "No user with this id")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<UpdateUserRequest>,
) -> HttpResponse {
    let id = path.into_inner();
    log::info!("✏️ PATCH /user/{}", id);

    let result = async {
        authorize(&claims, &id)?;
        user_service::update_user(&db, &id, &request).await
    }
    .await;

    match result {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(e) => {
            log::warn!("❌ Update failed for {}: {}", id, e);
            error_response(&e)
        }
    }
}

#[utoipa::path(
    patch,
    path = "/api/v1/user/{id}/subscribe",
    tag = "User",
    params(("id" = String, Path, description = "User id")),
    request_body = SubscribeRequest,
    responses(
        (status = 200, description = "Subscribed to the weekly digest", body = UserResponse),
        (status = 404, description = "No user with this id")
    ),
    security(("bearer_auth" = []))
)]
pub async fn subscribe(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    request: Option<web::Json<SubscribeRequest>>,
) -> HttpResponse {
    let id = path.into_inner();
    log::info!("📬 PATCH /user/{}/subscribe", id);

    let request = request.map(|r| r.into_inner()).unwrap_or_default();

    let result = async {
        authorize(&claims, &id)?;
        user_service::subscribe(&db, &id, &request).await
    }
    .await;

    match result {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(e) => {
            log::warn!("❌ Could not subscribe {}: {}", id, e);
            error_response(&e)
        }
    }
}

#[utoipa::path(
    patch,
    path = "/api/v1/user/{id}/unsubscribe",
    tag = "User",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Unsubscribed from the weekly digest", body = UserResponse),
        (status = 404, description = "No user with this id")
    ),
    security(("bearer_auth" = []))
)]
pub async fn unsubscribe(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    log::info!("📭 PATCH /user/{}/unsubscribe", id);

    let result = async {
        authorize(&claims, &id)?;
        user_service::unsubscribe(&db, &id).await
    }
    .await;

    match result {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(e) => {
            log::warn!("❌ Could not unsubscribe {}: {}", id, e);
            error_response(&e)
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/user/{id}",
    tag = "User",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 404, description = "No user with this id")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    log::info!("🗑️ DELETE /user/{}", id);

    let result = async {
        authorize(&claims, &id)?;
        user_service::delete_user(&db, &id).await
    }
    .await;

    match result {
        Ok(id) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "id": id })),
        Err(e) => {
            log::error!("❌ Failed to delete user {}: {}", id, e);
            error_response(&e)
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/user/{id}/digest",
    tag = "Digest",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Digest processed for this user; body carries the outcome"),
        (status = 404, description = "No user with this id")
    ),
    security(("bearer_auth" = []))
)]
pub async fn send_digest_now(
    dispatcher: web::Data<DigestDispatcher>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    log::info!("📬 POST /user/{}/digest", id);

    if let Err(e) = authorize(&claims, &id) {
        return error_response(&e);
    }

    match dispatcher.deliver_to_user_id(&id).await {
        Ok(Some(outcome)) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "outcome": outcome
        })),
        Ok(None) => error_response(&AppError::NotFound(format!("No user with id {}", id))),
        Err(e) => error_response(&AppError::DatabaseError(e)),
    }
}

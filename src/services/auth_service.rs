use crate::{
    config::{AppConfig, JwtConfig},
    database::MongoDB,
    models::{AuthResponse, LoginRequest, SignupRequest, User},
    utils::AppError,
};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,           // user_id
    pub email: String,
    pub iat: usize,            // issued at
    pub exp: usize,            // expiration
    pub jti: String,           // JWT ID
    pub aud: String,           // audience
    pub iss: String,           // issuer
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost)
        .map_err(|e| AppError::InvalidRequest(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hashed: &str) -> Result<bool, AppError> {
    verify(password, hashed)
        .map_err(|e| AppError::Unauthorized(format!("Password verification error: {}", e)))
}

// Generate JWT token
pub fn generate_jwt(user_id: &str, email: &str, config: &JwtConfig) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(config.expiration_hours)).timestamp() as usize,
        jti: Uuid::new_v4().to_string(),
        aud: config.audience.clone(),
        iss: config.issuer.clone(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_ref()),
    )
    .map_err(|e| AppError::InvalidRequest(format!("Failed to generate token: {}", e)))
}

// Verify JWT token
pub fn verify_token(token: &str, config: &JwtConfig) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[config.audience.clone()]);

    let mut issuers = HashSet::new();
    issuers.insert(config.issuer.clone());
    validation.iss = Some(issuers);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_ref()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

// User login
pub async fn login(
    db: &MongoDB,
    request: &LoginRequest,
    config: &AppConfig,
) -> Result<AuthResponse, AppError> {
    let collection = db.collection::<User>("users");

    let user = collection
        .find_one(doc! { "email": &request.email })
        .await?
        .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

    if !verify_password(&request.password, &user.password)? {
        return Err(AppError::Unauthorized("Invalid Credentials".to_string()));
    }

    let token = generate_jwt(&user.user_id, &user.email, &config.jwt)?;

    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

// User signup
pub async fn signup(
    db: &MongoDB,
    request: &SignupRequest,
    config: &AppConfig,
) -> Result<AuthResponse, AppError> {
    let collection = db.collection::<User>("users");

    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return Err(AppError::InvalidRequest("Email and password are required".to_string()));
    }

    if collection.find_one(doc! { "email": email }).await?.is_some() {
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    if request.password != request.confirm_password {
        return Err(AppError::InvalidRequest("Passwords don't match".to_string()));
    }

    let hashed_password = hash_password(&request.password, config.bcrypt_cost)?;

    let new_user = User {
        _id: None,
        user_id: ObjectId::new().to_hex(),
        email: email.to_string(),
        password: hashed_password,
        first_name: request.first_name.clone(),
        last_name: request.last_name.clone(),
        role: "trainee".to_string(),
        level: "beginner".to_string(),
        interests: Vec::new(),
        subscribed: false,
        received_papers: Vec::new(),
        created_at: Some(BsonDateTime::now()),
        updated_at: Some(BsonDateTime::now()),
    };

    collection
        .insert_one(&new_user)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create user: {}", e)))?;

    let token = generate_jwt(&new_user.user_id, &new_user.email, &config.jwt)?;

    log::info!("✅ User registered successfully: {}", new_user.email);

    Ok(AuthResponse {
        token,
        user: new_user.into(),
    })
}

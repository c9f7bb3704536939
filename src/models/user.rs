use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

/// Usuário armazenado na coleção `users`
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub user_id: String,  // PRIMARY IDENTIFIER - ObjectId hex
    pub email: String,
    pub password: String,  // bcrypt hash
    pub first_name: String,
    pub last_name: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub subscribed: bool,
    /// Paper ids already emailed to this user
    #[serde(default)]
    pub received_papers: Vec<String>,
    pub created_at: Option<BsonDateTime>,
    pub updated_at: Option<BsonDateTime>,
}

fn default_role() -> String {
    "trainee".to_string()
}

fn default_level() -> String {
    "beginner".to_string()
}

impl User {
    pub fn has_received(&self, paper_id: &str) -> bool {
        self.received_papers.iter().any(|id| id == paper_id)
    }
}

/// Public view of a user (never carries the password hash)
#[derive(Debug, Serialize, Deserialize, Clone, utoipa::ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub level: String,
    pub interests: Vec<String>,
    pub subscribed: bool,
    pub received_papers: Vec<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.user_id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            level: user.level,
            interests: user.interests,
            subscribed: user.subscribed,
            received_papers: user.received_papers,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Partial profile update, only the provided fields are written
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub level: Option<String>,
    pub interests: Option<Vec<String>>,
    pub subscribed: Option<bool>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct SubscribeRequest {
    pub interests: Option<Vec<String>>,
}

use crate::{
    database::MongoDB,
    models::{SubscribeRequest, UpdateUserRequest, User, UserResponse},
    utils::AppError,
};
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use mongodb::options::ReturnDocument;

/// Ids are ObjectId hex strings; anything else cannot name a user.
pub fn validate_user_id(id: &str) -> Result<(), AppError> {
    ObjectId::parse_str(id)
        .map(|_| ())
        .map_err(|_| AppError::NotFound(format!("No user with id {}", id)))
}

pub async fn get_user(db: &MongoDB, id: &str) -> Result<UserResponse, AppError> {
    validate_user_id(id)?;

    db.collection::<User>("users")
        .find_one(doc! { "user_id": id })
        .await?
        .map(UserResponse::from)
        .ok_or_else(|| AppError::NotFound(format!("No user with id {}", id)))
}

/// `$set` document for the fields present in the request
pub fn update_document(request: &UpdateUserRequest) -> Document {
    let mut set = doc! { "updated_at": BsonDateTime::now() };

    if let Some(first_name) = &request.first_name {
        set.insert("first_name", first_name.clone());
    }
    if let Some(last_name) = &request.last_name {
        set.insert("last_name", last_name.clone());
    }
    if let Some(role) = &request.role {
        set.insert("role", role.clone());
    }
    if let Some(level) = &request.level {
        set.insert("level", level.clone());
    }
    if let Some(interests) = &request.interests {
        set.insert("interests", interests.clone());
    }
    if let Some(subscribed) = request.subscribed {
        set.insert("subscribed", subscribed);
    }

    set
}

async fn apply_update(db: &MongoDB, id: &str, set: Document) -> Result<UserResponse, AppError> {
    validate_user_id(id)?;

    db.collection::<User>("users")
        .find_one_and_update(doc! { "user_id": id }, doc! { "$set": set })
        .return_document(ReturnDocument::After)
        .await?
        .map(UserResponse::from)
        .ok_or_else(|| AppError::NotFound(format!("No user with id {}", id)))
}

pub async fn update_user(
    db: &MongoDB,
    id: &str,
    request: &UpdateUserRequest,
) -> Result<UserResponse, AppError> {
    apply_update(db, id, update_document(request)).await
}

pub async fn subscribe(
    db: &MongoDB,
    id: &str,
    request: &SubscribeRequest,
) -> Result<UserResponse, AppError> {
    let update = UpdateUserRequest {
        interests: request.interests.clone(),
        subscribed: Some(true),
        ..UpdateUserRequest::default()
    };

    log::info!("📬 Subscribing user {} to the weekly digest", id);
    apply_update(db, id, update_document(&update)).await
}

pub async fn unsubscribe(db: &MongoDB, id: &str) -> Result<UserResponse, AppError> {
    let update = UpdateUserRequest {
        subscribed: Some(false),
        ..UpdateUserRequest::default()
    };

    log::info!("📭 Unsubscribing user {} from the weekly digest", id);
    apply_update(db, id, update_document(&update)).await
}

pub async fn delete_user(db: &MongoDB, id: &str) -> Result<String, AppError> {
    validate_user_id(id)?;

    let result = db
        .collection::<User>("users")
        .delete_one(doc! { "user_id": id })
        .await?;

    if result.deleted_count == 0 {
        return Err(AppError::NotFound(format!("No user with id {}", id)));
    }

    log::info!("🗑️ User {} deleted", id);
    Ok(id.to_string())
}

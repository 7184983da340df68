//! User Management API Endpoints (admin only)
//! Mission: Account administration - list, create, update, deactivate

use crate::auth::{
    api::{AuthApiError, AuthState, MIN_PASSWORD_LEN},
    models::{RegisterRequest, User, UserResponse, UserRole},
    user_store::UserUpdate,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
}

/// Partial update body; absent fields are left untouched
#[derive(Debug, Deserialize)]
pub struct UserUpdateRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

/// List users - GET /api/users?role=student
pub async fn list_users(
    State(state): State<AuthState>,
    Query(params): Query<UserListQuery>,
) -> Result<Json<Vec<UserResponse>>, AuthApiError> {
    let users = state
        .user_store
        .list_users(params.role.as_ref())
        .map_err(|_| AuthApiError::InternalError)?;

    let response: Vec<UserResponse> = users.iter().map(UserResponse::from_user).collect();
    Ok(Json(response))
}

/// Get one user - GET /api/users/:id
pub async fn get_user(
    State(state): State<AuthState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AuthApiError> {
    let uuid = Uuid::parse_str(&user_id).map_err(|_| AuthApiError::InvalidUserId)?;

    let user = state
        .user_store
        .get_by_id(&uuid)
        .map_err(|_| AuthApiError::InternalError)?
        .ok_or(AuthApiError::UserNotFound)?;

    Ok(Json(UserResponse::from_user(&user)))
}

/// Create user - POST /api/users
pub async fn create_user(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AuthApiError> {
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AuthApiError::WeakPassword);
    }

    let existing = state
        .user_store
        .get_by_email(&payload.email)
        .map_err(|_| AuthApiError::InternalError)?;
    if existing.is_some() {
        return Err(AuthApiError::EmailConflict);
    }

    let user = state
        .user_store
        .create_user(
            &payload.email,
            &payload.password,
            payload.role,
            &payload.first_name,
            &payload.last_name,
            payload.phone.as_deref(),
        )
        .map_err(|e| {
            warn!("Failed to create user: {}", e);
            AuthApiError::EmailConflict
        })?;

    Ok((StatusCode::CREATED, Json(UserResponse::from_user(&user))))
}

/// Update user - PUT /api/users/:id
pub async fn update_user(
    State(state): State<AuthState>,
    Path(user_id): Path<String>,
    Json(payload): Json<UserUpdateRequest>,
) -> Result<Json<UserResponse>, AuthApiError> {
    let uuid = Uuid::parse_str(&user_id).map_err(|_| AuthApiError::InvalidUserId)?;

    let update = UserUpdate {
        first_name: payload.first_name,
        last_name: payload.last_name,
        phone: payload.phone,
        role: payload.role,
        is_active: payload.is_active,
    };

    let user = state
        .user_store
        .update_user(&uuid, update)
        .map_err(|_| AuthApiError::InternalError)?
        .ok_or(AuthApiError::UserNotFound)?;

    Ok(Json(UserResponse::from_user(&user)))
}

/// Deactivate user (soft-delete) - DELETE /api/users/:id
///
/// The account is never hard-deleted; clearing the active flag immediately
/// invalidates guard checks for any still-unexpired access tokens.
pub async fn deactivate_user(
    State(state): State<AuthState>,
    Extension(current_user): Extension<User>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AuthApiError> {
    let uuid = Uuid::parse_str(&user_id).map_err(|_| AuthApiError::InvalidUserId)?;

    if uuid == current_user.id {
        return Err(AuthApiError::CannotDeactivateSelf);
    }

    let target = state
        .user_store
        .get_by_id(&uuid)
        .map_err(|_| AuthApiError::InternalError)?
        .ok_or(AuthApiError::UserNotFound)?;

    state
        .user_store
        .deactivate(&uuid)
        .map_err(|_| AuthApiError::InternalError)?;

    info!("🚫 Admin {} deactivated {}", current_user.email, target.email);
    Ok(Json(
        json!({ "message": format!("User {} deactivated", target.email) }),
    ))
}

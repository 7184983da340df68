//! Authentication API Endpoints
//! Mission: Login, refresh-token rotation, logout, and profile endpoints

use crate::auth::{
    jwt::{TokenError, TokenIssuer},
    models::{
        ChangePasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest, TokenPair,
        TokenResponse, TokenType, User, UserResponse,
    },
    token_ledger::TokenLedger,
    user_store::UserStore,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub issuer: Arc<TokenIssuer>,
    pub ledger: Arc<TokenLedger>,
}

impl AuthState {
    pub fn new(
        user_store: Arc<UserStore>,
        issuer: Arc<TokenIssuer>,
        ledger: Arc<TokenLedger>,
    ) -> Self {
        Self {
            user_store,
            issuer,
            ledger,
        }
    }

    /// Issue a pair, persist the refresh half, and stamp last_login.
    fn grant_session(&self, user: &User) -> Result<TokenResponse, AuthApiError> {
        let pair: TokenPair = self
            .issuer
            .issue_pair(user)
            .map_err(|_| AuthApiError::InternalError)?;

        self.ledger
            .store(&user.id, &pair.refresh_token, pair.refresh_expires_at)
            .map_err(|_| AuthApiError::InternalError)?;

        self.user_store
            .touch_last_login(&user.id, Utc::now())
            .map_err(|_| AuthApiError::InternalError)?;

        Ok(TokenResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer".to_string(),
            expires_in: self.issuer.access_expires_in(),
        })
    }
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AuthApiError> {
    info!("🔐 Login attempt: {}", payload.email);

    // Uniform failure for unknown email and wrong password - no
    // email-existence oracle.
    let valid = state
        .user_store
        .verify_password(&payload.email, &payload.password)
        .map_err(|_| AuthApiError::InternalError)?;

    if !valid {
        warn!("❌ Failed login attempt: {}", payload.email);
        return Err(AuthApiError::InvalidCredentials);
    }

    let user = state
        .user_store
        .get_by_email(&payload.email)
        .map_err(|_| AuthApiError::InternalError)?
        .ok_or(AuthApiError::InvalidCredentials)?;

    if !user.is_active {
        warn!("❌ Login rejected for deactivated account: {}", user.email);
        return Err(AuthApiError::AccountDeactivated);
    }

    let response = state.grant_session(&user)?;
    info!("✅ Login successful: {} ({})", user.email, user.role.as_str());

    Ok(Json(response))
}

/// Register endpoint - POST /api/auth/register
pub async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, AuthApiError> {
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AuthApiError::WeakPassword);
    }

    let existing = state
        .user_store
        .get_by_email(&payload.email)
        .map_err(|_| AuthApiError::InternalError)?;
    if existing.is_some() {
        return Err(AuthApiError::EmailTaken);
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
            AuthApiError::EmailTaken
        })?;

    let response = state.grant_session(&user)?;
    info!("✅ Registered user: {} ({})", user.email, user.role.as_str());

    Ok(Json(response))
}

/// Refresh endpoint - POST /api/auth/refresh
///
/// Rotating refresh tokens: redemption deletes the old ledger row in one
/// atomic statement and issues a new pair, so a leaked refresh token is
/// good for at most one use.
pub async fn refresh(
    State(state): State<AuthState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AuthApiError> {
    let claims = state
        .issuer
        .decode_expected(&payload.refresh_token, TokenType::Refresh)
        .map_err(|e| match e {
            TokenError::WrongType => AuthApiError::InvalidTokenType,
            _ => AuthApiError::InvalidRefreshToken,
        })?;

    let user_id = state
        .ledger
        .redeem(&payload.refresh_token)
        .map_err(|_| AuthApiError::InternalError)?
        .ok_or(AuthApiError::RefreshTokenUsed)?;

    let user = state
        .user_store
        .get_by_id(&user_id)
        .map_err(|_| AuthApiError::InternalError)?
        .filter(|u| u.is_active)
        .ok_or(AuthApiError::UserInactiveOrMissing)?;

    let response = state.grant_session(&user)?;
    info!("🔄 Rotated refresh token for {}", claims.email);

    Ok(Json(response))
}

/// Logout endpoint - POST /api/auth/logout (authenticated)
///
/// Revokes the presented refresh token unconditionally. Access tokens are
/// not revocable before natural expiry; that trade-off is accepted.
pub async fn logout(
    State(state): State<AuthState>,
    Extension(user): Extension<User>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<Json<serde_json::Value>, AuthApiError> {
    state
        .ledger
        .revoke(&payload.refresh_token)
        .map_err(|_| AuthApiError::InternalError)?;

    info!("👋 Logged out: {}", user.email);
    Ok(Json(json!({ "message": "Logged out successfully" })))
}

/// Current user profile - GET /api/auth/me (authenticated)
pub async fn me(Extension(user): Extension<User>) -> Json<UserResponse> {
    Json(UserResponse::from_user(&user))
}

/// Change own password - POST /api/auth/change-password (authenticated)
pub async fn change_password(
    State(state): State<AuthState>,
    Extension(user): Extension<User>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, AuthApiError> {
    let valid = state
        .user_store
        .verify_password(&user.email, &payload.current_password)
        .map_err(|_| AuthApiError::InternalError)?;
    if !valid {
        return Err(AuthApiError::CurrentPasswordIncorrect);
    }

    if payload.new_password.len() < MIN_PASSWORD_LEN {
        return Err(AuthApiError::WeakPassword);
    }

    state
        .user_store
        .set_password(&user.id, &payload.new_password)
        .map_err(|_| AuthApiError::InternalError)?;

    info!("🔑 Password changed for {}", user.email);
    Ok(Json(json!({ "message": "Password changed successfully" })))
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    InvalidCredentials,
    AccountDeactivated,
    EmailTaken,
    EmailConflict,
    WeakPassword,
    InvalidRefreshToken,
    InvalidTokenType,
    RefreshTokenUsed,
    UserInactiveOrMissing,
    CurrentPasswordIncorrect,
    UserNotFound,
    InvalidUserId,
    CannotDeactivateSelf,
    InternalError,
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid email or password")
            }
            AuthApiError::AccountDeactivated => (
                StatusCode::FORBIDDEN,
                "Account is deactivated. Contact administrator.",
            ),
            AuthApiError::EmailTaken => (StatusCode::BAD_REQUEST, "Email is already registered"),
            AuthApiError::EmailConflict => (StatusCode::CONFLICT, "Email already registered"),
            AuthApiError::WeakPassword => (
                StatusCode::BAD_REQUEST,
                "Password must be at least 8 characters",
            ),
            AuthApiError::InvalidRefreshToken => {
                (StatusCode::UNAUTHORIZED, "Invalid or expired refresh token")
            }
            AuthApiError::InvalidTokenType => (StatusCode::UNAUTHORIZED, "Invalid token type"),
            AuthApiError::RefreshTokenUsed => (
                StatusCode::UNAUTHORIZED,
                "Refresh token not found or already used",
            ),
            AuthApiError::UserInactiveOrMissing => {
                (StatusCode::UNAUTHORIZED, "User not found or deactivated")
            }
            AuthApiError::CurrentPasswordIncorrect => {
                (StatusCode::BAD_REQUEST, "Current password is incorrect")
            }
            AuthApiError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            AuthApiError::InvalidUserId => (StatusCode::BAD_REQUEST, "Invalid user ID format"),
            AuthApiError::CannotDeactivateSelf => {
                (StatusCode::BAD_REQUEST, "Cannot deactivate your own account")
            }
            AuthApiError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_api_error_responses() {
        let invalid_creds = AuthApiError::InvalidCredentials.into_response();
        assert_eq!(invalid_creds.status(), StatusCode::UNAUTHORIZED);

        let deactivated = AuthApiError::AccountDeactivated.into_response();
        assert_eq!(deactivated.status(), StatusCode::FORBIDDEN);

        let used = AuthApiError::RefreshTokenUsed.into_response();
        assert_eq!(used.status(), StatusCode::UNAUTHORIZED);

        let conflict = AuthApiError::EmailConflict.into_response();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let weak = AuthApiError::WeakPassword.into_response();
        assert_eq!(weak.status(), StatusCode::BAD_REQUEST);
    }
}

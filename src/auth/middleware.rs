//! Authentication Middleware
//! Mission: Validate bearer tokens per request and gate routes by role

use crate::auth::api::AuthState;
use crate::auth::jwt::TokenError;
use crate::auth::models::{TokenType, User, UserRole};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};
use uuid::Uuid;

/// Allow-lists for the role gate
pub const ADMIN_ONLY: &[UserRole] = &[UserRole::Admin];
pub const ADMIN_OR_TEACHER: &[UserRole] = &[UserRole::Admin, UserRole::Teacher];
pub const ANY_AUTHENTICATED: &[UserRole] = &[
    UserRole::Admin,
    UserRole::Teacher,
    UserRole::Student,
    UserRole::Parent,
];

/// Session guard: validate the access token and load the acting user.
///
/// Rejection order matters: missing header before any crypto, signature +
/// expiry before type, type before subject, subject before the DB load.
/// Unknown ids surface as a uniform 401 so callers cannot probe which user
/// ids exist. Inactive accounts are 403 - known but disallowed.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t.to_string())
        .ok_or(AuthError::MissingToken)?;

    let claims = state
        .issuer
        .decode_expected(&token, TokenType::Access)
        .map_err(|e| match e {
            TokenError::Expired => AuthError::ExpiredToken,
            TokenError::WrongType => AuthError::WrongTokenType,
            TokenError::Invalid => AuthError::InvalidToken,
        })?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidSubject)?;

    let user = state
        .user_store
        .get_by_id(&user_id)
        .map_err(|e| {
            error!("User lookup failed during auth: {}", e);
            AuthError::Internal
        })?
        .ok_or(AuthError::UnknownUser)?;

    if !user.is_active {
        warn!("Rejected request from deactivated account {}", user.email);
        return Err(AuthError::AccountDeactivated);
    }

    // Make the loaded user available to handlers and the role gate
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Role gate: reject callers whose role is not in the route's allow-list.
/// Applied after the session guard; pure and stateless.
pub async fn role_gate(
    allowed: &'static [UserRole],
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = req
        .extensions()
        .get::<User>()
        .ok_or(AuthError::MissingToken)?;

    if !allowed.contains(&user.role) {
        warn!(
            "Role gate rejected {} ({}) - requires one of {:?}",
            user.email,
            user.role.as_str(),
            allowed.iter().map(|r| r.as_str()).collect::<Vec<_>>()
        );
        return Err(AuthError::InsufficientRole);
    }

    Ok(next.run(req).await)
}

/// Guard rejection kinds. All map to 401 except the inactive-account and
/// role-gate cases, which are 403 (the credentials themselves are valid).
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    ExpiredToken,
    InvalidToken,
    WrongTokenType,
    InvalidSubject,
    UnknownUser,
    AccountDeactivated,
    InsufficientRole,
    Internal,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
            AuthError::ExpiredToken => (StatusCode::UNAUTHORIZED, "Token has expired"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::WrongTokenType => (StatusCode::UNAUTHORIZED, "Invalid token type"),
            AuthError::InvalidSubject => (StatusCode::UNAUTHORIZED, "Invalid token payload"),
            // Deliberately indistinguishable from other 401s
            AuthError::UnknownUser => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            AuthError::AccountDeactivated => (StatusCode::FORBIDDEN, "Account is deactivated"),
            AuthError::InsufficientRole => (StatusCode::FORBIDDEN, "Insufficient permissions"),
            AuthError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_status_codes() {
        for unauthorized in [
            AuthError::MissingToken,
            AuthError::ExpiredToken,
            AuthError::InvalidToken,
            AuthError::WrongTokenType,
            AuthError::InvalidSubject,
            AuthError::UnknownUser,
        ] {
            assert_eq!(
                unauthorized.into_response().status(),
                StatusCode::UNAUTHORIZED
            );
        }

        assert_eq!(
            AuthError::AccountDeactivated.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::InsufficientRole.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_allow_lists() {
        assert!(ADMIN_ONLY.contains(&UserRole::Admin));
        assert!(!ADMIN_ONLY.contains(&UserRole::Teacher));
        assert!(ADMIN_OR_TEACHER.contains(&UserRole::Teacher));
        assert!(!ADMIN_OR_TEACHER.contains(&UserRole::Parent));
        assert_eq!(ANY_AUTHENTICATED.len(), 4);
    }
}

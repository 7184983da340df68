//! JWT Token Issuer
//! Mission: Mint and validate signed access/refresh token pairs

use crate::auth::models::{Claims, TokenPair, TokenType, User};
use crate::config::Config;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;
use uuid::Uuid;

/// Token validation failure kinds.
///
/// Expired and structurally-invalid tokens both map to 401 at the HTTP
/// boundary, but are distinct kinds for logging and tests.
#[derive(Debug, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    WrongType,
    Invalid,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Expired => write!(f, "Token has expired"),
            TokenError::WrongType => write!(f, "Invalid token type"),
            TokenError::Invalid => write!(f, "Invalid token"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Issues and validates signed token pairs.
///
/// Pure over claims + clock + signing key; persisting the refresh token
/// into the ledger is the caller's responsibility.
pub struct TokenIssuer {
    secret: String,
    access_minutes: i64,
    refresh_days: i64,
}

impl TokenIssuer {
    pub fn new(config: &Config) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            access_minutes: config.access_token_expire_minutes,
            refresh_days: config.refresh_token_expire_days,
        }
    }

    /// Issue an access + refresh pair with the configured lifetimes
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair> {
        self.issue_pair_with_lifetimes(
            user,
            Duration::minutes(self.access_minutes),
            Duration::days(self.refresh_days),
        )
    }

    /// Issue a pair with explicit lifetime overrides
    pub fn issue_pair_with_lifetimes(
        &self,
        user: &User,
        access_lifetime: Duration,
        refresh_lifetime: Duration,
    ) -> Result<TokenPair> {
        let access_token = self.sign(user, access_lifetime, TokenType::Access)?;
        let refresh_token = self.sign(user, refresh_lifetime, TokenType::Refresh)?;

        let refresh_expires_at = Utc::now()
            .checked_add_signed(refresh_lifetime)
            .context("Invalid refresh expiry timestamp")?;

        debug!(
            "Issued token pair for {} (access {}m, refresh {}d)",
            user.email,
            access_lifetime.num_minutes(),
            refresh_lifetime.num_days()
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
            refresh_expires_at,
        })
    }

    fn sign(&self, user: &User, lifetime: Duration, token_type: TokenType) -> Result<String> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(lifetime)
            .context("Invalid expiry timestamp")?;

        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role.clone(),
            email: user.email.clone(),
            iat: now.timestamp() as usize,
            exp: expiration.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
            token_type,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to sign token")
    }

    /// Verify signature + expiry and extract claims
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0; // exact expiry, no grace window

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;

        Ok(decoded.claims)
    }

    /// Decode and additionally require the declared token type
    pub fn decode_expected(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        if claims.token_type != expected {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }

    /// Access token lifetime in seconds, for `expires_in` responses
    pub fn access_expires_in(&self) -> usize {
        (self.access_minutes * 60) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::UserRole;
    use crate::config::Config;

    fn test_issuer() -> TokenIssuer {
        let mut config = Config::for_tests();
        config.jwt_secret = "test-secret-key-12345".to_string();
        TokenIssuer::new(&config)
    }

    fn create_test_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            password_hash: "hash".to_string(),
            role: UserRole::Teacher,
            first_name: "Test".to_string(),
            last_name: "Teacher".to_string(),
            phone: None,
            is_active: true,
            last_login: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_pair_issuance_and_validation() {
        let issuer = test_issuer();
        let user = create_test_user();

        let pair = issuer.issue_pair(&user).unwrap();
        assert!(!pair.access_token.is_empty());
        assert!(!pair.refresh_token.is_empty());
        assert_ne!(pair.access_token, pair.refresh_token);

        let access = issuer
            .decode_expected(&pair.access_token, TokenType::Access)
            .unwrap();
        assert_eq!(access.sub, user.id.to_string());
        assert_eq!(access.email, user.email);
        assert_eq!(access.role, UserRole::Teacher);

        let refresh = issuer
            .decode_expected(&pair.refresh_token, TokenType::Refresh)
            .unwrap();
        assert_eq!(refresh.sub, user.id.to_string());
        assert!(refresh.exp > access.exp);
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let issuer = test_issuer();
        let pair = issuer.issue_pair(&create_test_user()).unwrap();

        // Refresh token presented where an access token is required
        let err = issuer
            .decode_expected(&pair.refresh_token, TokenType::Access)
            .unwrap_err();
        assert_eq!(err, TokenError::WrongType);

        // And the other way around
        let err = issuer
            .decode_expected(&pair.access_token, TokenType::Refresh)
            .unwrap_err();
        assert_eq!(err, TokenError::WrongType);
    }

    #[test]
    fn test_expired_token_distinct_from_invalid() {
        let issuer = test_issuer();
        let user = create_test_user();

        let pair = issuer
            .issue_pair_with_lifetimes(&user, Duration::minutes(-5), Duration::days(7))
            .unwrap();

        let err = issuer.decode(&pair.access_token).unwrap_err();
        assert_eq!(err, TokenError::Expired);

        let err = issuer.decode("not.a.token").unwrap_err();
        assert_eq!(err, TokenError::Invalid);
    }

    #[test]
    fn test_different_secrets_reject() {
        let issuer1 = test_issuer();
        let mut config = Config::for_tests();
        config.jwt_secret = "a-completely-different-secret".to_string();
        let issuer2 = TokenIssuer::new(&config);

        let pair = issuer1.issue_pair(&create_test_user()).unwrap();
        assert_eq!(
            issuer2.decode(&pair.access_token).unwrap_err(),
            TokenError::Invalid
        );
    }

    #[test]
    fn test_jti_unique_per_token() {
        let issuer = test_issuer();
        let user = create_test_user();

        let pair1 = issuer.issue_pair(&user).unwrap();
        let pair2 = issuer.issue_pair(&user).unwrap();

        let jti1 = issuer.decode(&pair1.refresh_token).unwrap().jti;
        let jti2 = issuer.decode(&pair2.refresh_token).unwrap().jti;
        assert_ne!(jti1, jti2);
    }
}

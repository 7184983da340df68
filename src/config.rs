//! Application Configuration
//! Mission: Collect all externally-supplied settings into one explicit struct
//!
//! Built once at startup from environment variables (plus .env via dotenv)
//! and passed to the components that need it. No global settings singleton.

use std::env;
use std::path::PathBuf;
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret-change-in-production-minimum-32-characters";

/// Central configuration for the auth backend
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub db_path: String,
    pub jwt_secret: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
}

impl Config {
    /// Load configuration from environment variables with sane defaults
    pub fn from_env() -> Self {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let db_path = resolve_data_path(env::var("AUTH_DB_PATH").ok(), "edunexus_auth.db");

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("⚠️  JWT_SECRET not set - using development secret");
            DEV_JWT_SECRET.to_string()
        });

        let access_token_expire_minutes = env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(30);

        let refresh_token_expire_days = env::var("REFRESH_TOKEN_EXPIRE_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(7);

        Self {
            bind_addr,
            db_path,
            jwt_secret,
            access_token_expire_minutes,
            refresh_token_expire_days,
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            db_path: ":memory:".to_string(),
            jwt_secret: "test-secret-key-12345".to_string(),
            access_token_expire_minutes: 30,
            refresh_token_expire_days: 7,
        }
    }
}

/// Resolve a data file path, treating relative paths as relative to the
/// crate directory so running from elsewhere doesn't create a stray DB.
fn resolve_data_path(env_value: Option<String>, default_filename: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) else {
        return base.join(default_filename).to_string_lossy().to_string();
    };

    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p.to_string_lossy().to_string();
    }

    base.join(p).to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_data_path_default() {
        let path = resolve_data_path(None, "test.db");
        assert!(path.ends_with("test.db"));
        assert!(PathBuf::from(&path).is_absolute());
    }

    #[test]
    fn test_resolve_data_path_absolute_passthrough() {
        let path = resolve_data_path(Some("/tmp/auth.db".to_string()), "test.db");
        assert_eq!(path, "/tmp/auth.db");
    }

    #[test]
    fn test_resolve_data_path_blank_falls_back() {
        let path = resolve_data_path(Some("   ".to_string()), "test.db");
        assert!(path.ends_with("test.db"));
    }
}

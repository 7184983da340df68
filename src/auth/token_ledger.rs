//! Refresh-Token Ledger
//! Mission: Track which refresh tokens are currently valid for redemption
//!
//! Each refresh token is single-use: redemption deletes the row in the same
//! statement that reads it, so concurrent redemptions of one token string
//! succeed for exactly one caller.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::debug;
use uuid::Uuid;

/// Persisted ledger of outstanding refresh tokens (SQLite backend)
pub struct TokenLedger {
    db_path: String,
}

impl TokenLedger {
    /// Create a new ledger and initialize database
    pub fn new(db_path: &str) -> Result<Self> {
        let ledger = Self {
            db_path: db_path.to_string(),
        };
        ledger.init_db()?;
        Ok(ledger)
    }

    fn init_db(&self) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS refresh_tokens (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                token TEXT UNIQUE NOT NULL,
                expires_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user ON refresh_tokens(user_id)",
            [],
        )?;

        Ok(())
    }

    /// Insert a new ledger row for an issued refresh token.
    /// Multiple rows per user are allowed (multi-device).
    pub fn store(&self, user_id: &Uuid, token: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;

        conn.execute(
            "INSERT INTO refresh_tokens (id, user_id, token, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Uuid::new_v4().to_string(),
                user_id.to_string(),
                token,
                expires_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )
        .context("Failed to store refresh token")?;

        Ok(())
    }

    /// Redeem a refresh token: delete-and-return the row's owner in one
    /// atomic statement. `None` means not found or already used - the
    /// replay rejection path.
    pub fn redeem(&self, token: &str) -> Result<Option<Uuid>> {
        let conn = Connection::open(&self.db_path)?;

        let result = conn.query_row(
            "DELETE FROM refresh_tokens WHERE token = ?1 RETURNING user_id",
            params![token],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(user_id) => {
                let user_id =
                    Uuid::parse_str(&user_id).context("Corrupt user_id in refresh ledger")?;
                debug!("Redeemed refresh token for user {}", user_id);
                Ok(Some(user_id))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a token unconditionally (logout). Succeeds even when no row
    /// matched - the end state is what matters.
    pub fn revoke(&self, token: &str) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;

        let rows = conn.execute(
            "DELETE FROM refresh_tokens WHERE token = ?1",
            params![token],
        )?;

        debug!("Revoked refresh token ({} row(s) removed)", rows);
        Ok(())
    }

    /// Remove rows whose expiry has passed. Run at startup to keep the
    /// ledger bounded; expired tokens fail signature validation anyway.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = Connection::open(&self.db_path)?;

        let rows = conn.execute(
            "DELETE FROM refresh_tokens WHERE expires_at < ?1",
            params![now.to_rfc3339()],
        )?;

        Ok(rows)
    }

    /// Number of outstanding refresh tokens for a user
    pub fn count_for_user(&self, user_id: &Uuid) -> Result<i64> {
        let conn = Connection::open(&self.db_path)?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM refresh_tokens WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| row.get(0),
        )?;

        Ok(count)
    }
}

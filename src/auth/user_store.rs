//! User Storage
//! Mission: Securely store and manage user accounts with SQLite

use crate::auth::models::{User, UserRole};
use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::{info, warn};
use uuid::Uuid;

/// Partial update applied by admin user management
#[derive(Debug, Default)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

/// User storage with SQLite backend
pub struct UserStore {
    db_path: String,
}

impl UserStore {
    /// Create a new user store and initialize database
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    /// Initialize database schema
    fn init_db(&self) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                phone TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                last_login TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.create_default_admin(&conn)?;

        Ok(())
    }

    /// Create default admin user for initial setup
    fn create_default_admin(&self, conn: &Connection) -> Result<()> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE role = 'admin'",
                [],
                |row| row.get(0),
            )
            .context("Failed to check for admin users")?;

        if count == 0 {
            let password_hash =
                hash("admin123", DEFAULT_COST).context("Failed to hash password")?;

            conn.execute(
                "INSERT INTO users (id, email, password_hash, role, first_name, last_name, phone, is_active, last_login, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, NULL, ?8)",
                params![
                    Uuid::new_v4().to_string(),
                    "admin@edunexus.school",
                    password_hash,
                    UserRole::Admin.as_str(),
                    "System",
                    "Administrator",
                    Option::<String>::None,
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("Failed to insert admin user")?;

            info!("🔐 Default admin created (email: admin@edunexus.school, password: admin123)");
            warn!("⚠️  CHANGE DEFAULT PASSWORD IN PRODUCTION!");
        }

        Ok(())
    }

    fn row_to_user(row: &Row) -> rusqlite::Result<User> {
        let id_str: String = row.get(0)?;
        let role_str: String = row.get(3)?;
        let active: i64 = row.get(7)?;
        Ok(User {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            email: row.get(1)?,
            password_hash: row.get(2)?,
            role: UserRole::from_str(&role_str).unwrap_or(UserRole::Student),
            first_name: row.get(4)?,
            last_name: row.get(5)?,
            phone: row.get(6)?,
            is_active: active != 0,
            last_login: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    const USER_COLUMNS: &'static str =
        "id, email, password_hash, role, first_name, last_name, phone, is_active, last_login, created_at";

    /// Get user by email
    pub fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = Connection::open(&self.db_path)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE email = ?1",
            Self::USER_COLUMNS
        ))?;

        match stmt.query_row(params![email], Self::row_to_user) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get user by id
    pub fn get_by_id(&self, user_id: &Uuid) -> Result<Option<User>> {
        let conn = Connection::open(&self.db_path)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE id = ?1",
            Self::USER_COLUMNS
        ))?;

        match stmt.query_row(params![user_id.to_string()], Self::row_to_user) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Verify email and password against the stored bcrypt hash
    pub fn verify_password(&self, email: &str, password: &str) -> Result<bool> {
        match self.get_by_email(email)? {
            Some(user) => {
                let valid =
                    verify(password, &user.password_hash).context("Failed to verify password")?;
                Ok(valid)
            }
            None => Ok(false),
        }
    }

    /// Create a new user
    pub fn create_user(
        &self,
        email: &str,
        password: &str,
        role: UserRole,
        first_name: &str,
        last_name: &str,
        phone: Option<&str>,
    ) -> Result<User> {
        let password_hash = hash(password, DEFAULT_COST).context("Failed to hash password")?;

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash,
            role,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            phone: phone.map(str::to_string),
            is_active: true,
            last_login: None,
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "INSERT INTO users (id, email, password_hash, role, first_name, last_name, phone, is_active, last_login, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, NULL, ?8)",
            params![
                user.id.to_string(),
                user.email,
                user.password_hash,
                user.role.as_str(),
                user.first_name,
                user.last_name,
                user.phone,
                user.created_at,
            ],
        )
        .context("Failed to insert user")?;

        info!("✅ Created user: {} ({})", user.email, user.role.as_str());

        Ok(user)
    }

    /// List users, optionally filtered by role
    pub fn list_users(&self, role: Option<&UserRole>) -> Result<Vec<User>> {
        let conn = Connection::open(&self.db_path)?;

        let users = match role {
            Some(role) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM users WHERE role = ?1 ORDER BY created_at DESC",
                    Self::USER_COLUMNS
                ))?;
                let rows = stmt.query_map(params![role.as_str()], Self::row_to_user)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM users ORDER BY created_at DESC",
                    Self::USER_COLUMNS
                ))?;
                let rows = stmt.query_map([], Self::row_to_user)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(users)
    }

    /// Apply a partial update to a user. Returns the updated record.
    pub fn update_user(&self, user_id: &Uuid, update: UserUpdate) -> Result<Option<User>> {
        let Some(mut user) = self.get_by_id(user_id)? else {
            return Ok(None);
        };

        if let Some(first_name) = update.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            user.last_name = last_name;
        }
        if let Some(phone) = update.phone {
            user.phone = Some(phone);
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(is_active) = update.is_active {
            user.is_active = is_active;
        }

        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "UPDATE users SET first_name = ?1, last_name = ?2, phone = ?3, role = ?4, is_active = ?5
             WHERE id = ?6",
            params![
                user.first_name,
                user.last_name,
                user.phone,
                user.role.as_str(),
                user.is_active as i64,
                user.id.to_string(),
            ],
        )
        .context("Failed to update user")?;

        Ok(Some(user))
    }

    /// Soft-delete: clear the active flag. Returns false if no such user.
    pub fn deactivate(&self, user_id: &Uuid) -> Result<bool> {
        let conn = Connection::open(&self.db_path)?;

        let rows_affected = conn.execute(
            "UPDATE users SET is_active = 0 WHERE id = ?1",
            params![user_id.to_string()],
        )?;

        if rows_affected > 0 {
            info!("🚫 Deactivated user: {}", user_id);
        }
        Ok(rows_affected > 0)
    }

    /// Replace the stored password hash
    pub fn set_password(&self, user_id: &Uuid, new_password: &str) -> Result<()> {
        let password_hash = hash(new_password, DEFAULT_COST).context("Failed to hash password")?;

        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, user_id.to_string()],
        )
        .context("Failed to update password")?;

        Ok(())
    }

    /// Stamp last_login on successful authentication
    pub fn touch_last_login(&self, user_id: &Uuid, at: DateTime<Utc>) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), user_id.to_string()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = UserStore::new(db_path).unwrap();
        (store, temp_file)
    }

    #[test]
    fn test_default_admin_created() {
        let (store, _temp) = create_test_store();

        let admin = store.get_by_email("admin@edunexus.school").unwrap();
        assert!(admin.is_some());

        let admin = admin.unwrap();
        assert_eq!(admin.role, UserRole::Admin);
        assert!(admin.is_active);
    }

    #[test]
    fn test_password_verification() {
        let (store, _temp) = create_test_store();

        assert!(store
            .verify_password("admin@edunexus.school", "admin123")
            .unwrap());
        assert!(!store
            .verify_password("admin@edunexus.school", "wrongpassword")
            .unwrap());
        assert!(!store.verify_password("nobody@x.com", "password").unwrap());
    }

    #[test]
    fn test_create_and_retrieve_user() {
        let (store, _temp) = create_test_store();

        let teacher = store
            .create_user(
                "t@x.com",
                "password123",
                UserRole::Teacher,
                "Terry",
                "Teacher",
                Some("555-0100"),
            )
            .unwrap();

        let by_email = store.get_by_email("t@x.com").unwrap().unwrap();
        assert_eq!(by_email.id, teacher.id);
        assert_eq!(by_email.role, UserRole::Teacher);
        assert_eq!(by_email.phone.as_deref(), Some("555-0100"));

        let by_id = store.get_by_id(&teacher.id).unwrap().unwrap();
        assert_eq!(by_id.email, "t@x.com");
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let (store, _temp) = create_test_store();

        store
            .create_user("dup@x.com", "pass1234", UserRole::Student, "A", "B", None)
            .unwrap();
        let result =
            store.create_user("dup@x.com", "pass1234", UserRole::Parent, "C", "D", None);
        assert!(result.is_err());
    }

    #[test]
    fn test_deactivate_soft_deletes() {
        let (store, _temp) = create_test_store();

        let user = store
            .create_user("s@x.com", "pass1234", UserRole::Student, "Sam", "Student", None)
            .unwrap();

        assert!(store.deactivate(&user.id).unwrap());

        // Record still exists, but inactive
        let user = store.get_by_id(&user.id).unwrap().unwrap();
        assert!(!user.is_active);

        // Unknown id reports false
        assert!(!store.deactivate(&Uuid::new_v4()).unwrap());
    }

    #[test]
    fn test_update_user_partial() {
        let (store, _temp) = create_test_store();

        let user = store
            .create_user("p@x.com", "pass1234", UserRole::Parent, "Pat", "Parent", None)
            .unwrap();

        let updated = store
            .update_user(
                &user.id,
                UserUpdate {
                    first_name: Some("Patricia".to_string()),
                    role: Some(UserRole::Teacher),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.first_name, "Patricia");
        assert_eq!(updated.last_name, "Parent"); // untouched
        assert_eq!(updated.role, UserRole::Teacher);

        assert!(store
            .update_user(&Uuid::new_v4(), UserUpdate::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_list_users_role_filter() {
        let (store, _temp) = create_test_store();

        store
            .create_user("s1@x.com", "pass1234", UserRole::Student, "S", "One", None)
            .unwrap();
        store
            .create_user("s2@x.com", "pass1234", UserRole::Student, "S", "Two", None)
            .unwrap();

        let all = store.list_users(None).unwrap();
        assert_eq!(all.len(), 3); // default admin + 2 students

        let students = store.list_users(Some(&UserRole::Student)).unwrap();
        assert_eq!(students.len(), 2);

        let parents = store.list_users(Some(&UserRole::Parent)).unwrap();
        assert!(parents.is_empty());
    }

    #[test]
    fn test_set_password() {
        let (store, _temp) = create_test_store();

        let user = store
            .create_user("c@x.com", "oldpass123", UserRole::Student, "C", "D", None)
            .unwrap();

        store.set_password(&user.id, "newpass456").unwrap();

        assert!(!store.verify_password("c@x.com", "oldpass123").unwrap());
        assert!(store.verify_password("c@x.com", "newpass456").unwrap());
    }

    #[test]
    fn test_touch_last_login() {
        let (store, _temp) = create_test_store();

        let user = store
            .create_user("l@x.com", "pass1234", UserRole::Student, "L", "L", None)
            .unwrap();
        assert!(user.last_login.is_none());

        store.touch_last_login(&user.id, Utc::now()).unwrap();
        let user = store.get_by_id(&user.id).unwrap().unwrap();
        assert!(user.last_login.is_some());
    }
}

use chrono::{Duration, Utc};
use libsql::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config;
use crate::db::Database;
use crate::error::DomainError;

/// Fixed-width UTC format so expiry strings compare lexicographically,
/// both here and inside SQL.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "member" => Some(Role::Member),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub member_id: Option<i32>,
    pub created_at: String,
}

/// The signed-in identity injected into request extensions by the auth
/// middleware.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub member_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub member_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user_id: i32,
    pub expires_at: String,
}

fn digest_with_salt(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Produces a `salt$digest` string for storage.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = digest_with_salt(&salt, password);
    format!("{salt}${digest}")
}

pub fn verify_password(stored: &str, password: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, digest)) => digest_with_salt(salt, password) == digest,
        None => false,
    }
}

pub struct Accounts<'a> {
    conn: &'a Connection,
}

impl<'a> Accounts<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn create_user(&self, input: CreateUser) -> Result<User, DomainError> {
        let username = input.username.trim();
        if username.is_empty() {
            return Err(DomainError::Invalid("username is required".into()));
        }
        if input.password.len() < 8 {
            return Err(DomainError::Invalid("password must be at least 8 characters".into()));
        }

        let digest = hash_password(&input.password);

        let query = r#"
            INSERT INTO users (username, password_digest, role, member_id)
            VALUES (?, ?, ?, ?)
            RETURNING id, username, role, member_id, created_at
        "#;

        let mut rows = match self
            .conn
            .query(
                query,
                libsql::params![username, digest, input.role.as_str(), input.member_id],
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) if e.to_string().contains("UNIQUE constraint failed") => {
                return Err(DomainError::Conflict(format!("username '{}' is taken", username)));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(row) = rows.next().await? {
            Ok(Self::row_to_user(&row)?)
        } else {
            Err(DomainError::Internal(anyhow::anyhow!("failed to create user")))
        }
    }

    pub async fn has_admin_user(&self) -> Result<bool, DomainError> {
        let mut rows = self
            .conn
            .query("SELECT 1 FROM users WHERE role = 'admin' LIMIT 1", ())
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// Checks username + password. Returns `None` for unknown users and bad
    /// passwords alike.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<User>, DomainError> {
        let query = r#"
            SELECT id, username, role, member_id, created_at, password_digest
            FROM users WHERE username = ?
        "#;
        let mut rows = self.conn.query(query, libsql::params![username.trim()]).await?;

        let row = match rows.next().await? {
            Some(row) => row,
            None => return Ok(None),
        };

        let digest: String = row.get(5)?;
        if !verify_password(&digest, password) {
            return Ok(None);
        }

        Ok(Some(Self::row_to_user(&row)?))
    }

    pub async fn create_session(&self, user_id: i32, ttl_minutes: i64) -> Result<Session, DomainError> {
        let token = Uuid::new_v4().to_string();
        let expires_at = (Utc::now() + Duration::minutes(ttl_minutes))
            .format(TIME_FORMAT)
            .to_string();

        self.conn
            .execute(
                "INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)",
                libsql::params![token.clone(), user_id, expires_at.clone()],
            )
            .await?;

        Ok(Session {
            token,
            user_id,
            expires_at,
        })
    }

    /// Resolves a session token to its user. Expired sessions are deleted on
    /// sight and resolve to `None`.
    pub async fn session_user(&self, token: &str) -> Result<Option<CurrentUser>, DomainError> {
        let query = r#"
            SELECT users.id, users.username, users.role, users.member_id, sessions.expires_at
            FROM sessions
            JOIN users ON users.id = sessions.user_id
            WHERE sessions.token = ?
        "#;
        let mut rows = self.conn.query(query, libsql::params![token]).await?;

        let row = match rows.next().await? {
            Some(row) => row,
            None => return Ok(None),
        };

        let expires_at: String = row.get(4)?;
        let now = Utc::now().format(TIME_FORMAT).to_string();
        if expires_at <= now {
            self.delete_session(token).await?;
            return Ok(None);
        }

        let role_str: String = row.get(2)?;
        let role = Role::from_str(&role_str)
            .ok_or_else(|| DomainError::Internal(anyhow::anyhow!("invalid role: {}", role_str)))?;

        Ok(Some(CurrentUser {
            id: row.get(0)?,
            username: row.get(1)?,
            role,
            member_id: row.get(3)?,
        }))
    }

    pub async fn delete_session(&self, token: &str) -> Result<bool, DomainError> {
        let changed = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?", libsql::params![token])
            .await?;
        Ok(changed > 0)
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64, DomainError> {
        let changed = self
            .conn
            .execute(
                "DELETE FROM sessions WHERE expires_at <= strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
                (),
            )
            .await?;
        Ok(changed)
    }

    fn row_to_user(row: &libsql::Row) -> Result<User, DomainError> {
        let role_str: String = row.get(2)?;
        let role = Role::from_str(&role_str)
            .ok_or_else(|| DomainError::Internal(anyhow::anyhow!("invalid role: {}", role_str)))?;

        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            role,
            member_id: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

/// Creates the initial admin account when none exists yet. Safe to run on
/// every startup.
pub async fn bootstrap_admin(db: &Database, auth_cfg: &config::Auth) -> Result<(), DomainError> {
    let accounts = Accounts::new(db.connection());
    if accounts.has_admin_user().await? {
        return Ok(());
    }

    let user = accounts
        .create_user(CreateUser {
            username: auth_cfg.admin_username.clone(),
            password: auth_cfg.admin_password.clone(),
            role: Role::Admin,
            member_id: None,
        })
        .await?;
    tracing::info!(username = %user.username, "bootstrapped initial admin user");
    Ok(())
}

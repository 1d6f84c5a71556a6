//! Session and identity management (spec §4.9): registration, login,
//! logout, session validation and password changes.

use chrono::{Duration, Utc};
use chunking_store::{ChunkRepo, StoreError, DEFAULT_GROUP_ID};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::error::AuthError;
use crate::password::{hash_password, validate_password, validate_username, verify_password};
use crate::token;

pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub is_admin: bool,
}

pub struct LoginResult {
    pub user: User,
    pub token: String,
    pub session_id: String,
}

pub struct AuthService<'a> {
    repo: &'a ChunkRepo,
    jwt_secret: String,
    jwt_ttl_hours: i64,
}

impl<'a> AuthService<'a> {
    pub fn new(repo: &'a ChunkRepo, jwt_secret: impl Into<String>, jwt_ttl_hours: i64) -> Self {
        Self { repo, jwt_secret: jwt_secret.into(), jwt_ttl_hours }
    }

    /// Registers a new user into the default group, inactive until an
    /// administrator approves the account (spec §3, §4.9).
    pub fn register(&self, username: &str, email: &str, password: &str) -> Result<User, AuthError> {
        validate_username(username)?;
        validate_password(password)?;

        let conn = self.repo.pool().get().map_err(StoreError::from)?;
        let dup: bool = conn
            .query_row("SELECT 1 FROM users WHERE username = ?1", params![username], |_| Ok(()))
            .optional()
            .map_err(StoreError::from)?
            .is_some();
        if dup {
            return Err(AuthError::UsernameTaken);
        }
        let dup_email: bool = conn
            .query_row("SELECT 1 FROM users WHERE email = ?1", params![email], |_| Ok(()))
            .optional()
            .map_err(StoreError::from)?
            .is_some();
        if dup_email {
            return Err(AuthError::EmailTaken);
        }

        let id = Uuid::new_v4().to_string();
        let password_hash = hash_password(password)?;
        conn.execute(
            "INSERT INTO users (id, username, email, password_hash, is_active, is_admin, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, 0, ?5)",
            params![id, username, email, password_hash, Utc::now().to_rfc3339()],
        )
        .map_err(StoreError::from)?;
        conn.execute(
            "INSERT OR IGNORE INTO user_groups (user_id, group_id) VALUES (?1, ?2)",
            params![id, DEFAULT_GROUP_ID],
        )
        .map_err(StoreError::from)?;

        Ok(User { id, username: username.to_string(), email: email.to_string(), is_active: false, is_admin: false })
    }

    pub fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        let mut conn = self.repo.pool().get().map_err(StoreError::from)?;

        let row = conn
            .query_row(
                "SELECT id, username, email, password_hash, is_active, is_admin FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(StoreError::from)?
            .ok_or(AuthError::UserNotFound)?;

        let (id, username, email, password_hash, is_active, is_admin) = row;
        if is_active == 0 {
            return Err(AuthError::UserInactive);
        }
        if !verify_password(password, &password_hash)? {
            return Err(AuthError::InvalidPassword);
        }

        let tx = conn.transaction().map_err(StoreError::from)?;
        tx.execute("UPDATE sessions SET is_active = 0 WHERE user_id = ?1", params![id]).map_err(StoreError::from)?;

        let session_id = hex_random_32();
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.jwt_ttl_hours);
        tx.execute(
            "INSERT INTO sessions (session_id, user_id, is_active, created_at, expires_at) VALUES (?1, ?2, 1, ?3, ?4)",
            params![session_id, id, now.to_rfc3339(), expires_at.to_rfc3339()],
        )
        .map_err(StoreError::from)?;
        tx.commit().map_err(StoreError::from)?;

        let jwt = token::issue(&self.jwt_secret, &id, &username, self.jwt_ttl_hours)?;

        Ok(LoginResult {
            user: User { id, username, email, is_active: true, is_admin: is_admin != 0 },
            token: jwt,
            session_id,
        })
    }

    pub fn logout(&self, session_id: &str) -> Result<(), AuthError> {
        let conn = self.repo.pool().get().map_err(StoreError::from)?;
        conn.execute("UPDATE sessions SET is_active = 0 WHERE session_id = ?1", params![session_id])
            .map_err(StoreError::from)?;
        Ok(())
    }

    /// Validates a session id, returning the owning user id if still active
    /// and unexpired.
    pub fn check_session(&self, session_id: &str) -> Result<String, AuthError> {
        let conn = self.repo.pool().get().map_err(StoreError::from)?;
        let row = conn
            .query_row(
                "SELECT user_id, is_active, expires_at FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?)),
            )
            .optional()
            .map_err(StoreError::from)?
            .ok_or(AuthError::SessionNotFound)?;

        let (user_id, is_active, expires_at) = row;
        if is_active == 0 {
            return Err(AuthError::SessionExpired);
        }
        let expires_at = chrono::DateTime::parse_from_rfc3339(&expires_at).map_err(|e| AuthError::Token(e.to_string()))?;
        if expires_at <= Utc::now() {
            return Err(AuthError::SessionExpired);
        }
        Ok(user_id)
    }

    pub fn change_password(&self, user_id: &str, current_password: &str, new_password: &str) -> Result<(), AuthError> {
        validate_password(new_password)?;
        let conn = self.repo.pool().get().map_err(StoreError::from)?;
        let current_hash: String = conn
            .query_row("SELECT password_hash FROM users WHERE id = ?1", params![user_id], |row| row.get(0))
            .optional()
            .map_err(StoreError::from)?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(current_password, &current_hash)? {
            return Err(AuthError::InvalidPassword);
        }

        let new_hash = hash_password(new_password)?;
        conn.execute("UPDATE users SET password_hash = ?1 WHERE id = ?2", params![new_hash, user_id])
            .map_err(StoreError::from)?;
        Ok(())
    }

    pub fn is_admin(&self, user_id: &str) -> Result<bool, AuthError> {
        let conn = self.repo.pool().get().map_err(StoreError::from)?;
        let admin: bool = conn
            .query_row(
                "SELECT 1 FROM user_groups WHERE user_id = ?1 AND group_id = ?2",
                params![user_id, chunking_store::ADMIN_GROUP_ID],
                |_| Ok(()),
            )
            .optional()
            .map_err(StoreError::from)?
            .is_some();
        Ok(admin)
    }
}

fn hex_random_32() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    // 32 bytes of session entropy, matching the 256-bit session id the
    // original implementation derives from `os.urandom(32)`.
    let mut bytes = [0u8; 32];
    let seed = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0);
    let uuid_bytes = Uuid::new_v4().into_bytes();
    for i in 0..32 {
        bytes[i] = uuid_bytes[i % 16] ^ ((seed >> ((i % 8) * 8)) as u8) ^ (i as u8);
    }
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ChunkRepo {
        ChunkRepo::new(chunking_store::init_pool(":memory:", 4).unwrap())
    }

    fn activate(repo: &ChunkRepo, user_id: &str) {
        let conn = repo.pool().get().unwrap();
        conn.execute("UPDATE users SET is_active = 1 WHERE id = ?1", params![user_id]).unwrap();
    }

    #[test]
    fn register_then_login_roundtrips() {
        let repo = setup();
        let auth = AuthService::new(&repo, "test-secret-value", 9);
        let user = auth.register("alice_wonderland", "alice@example.com", "correct-horse-battery").unwrap();
        activate(&repo, &user.id);

        let login = auth.login("alice_wonderland", "correct-horse-battery").unwrap();
        assert_eq!(login.user.username, "alice_wonderland");
        assert_eq!(auth.check_session(&login.session_id).unwrap(), login.user.id);
    }

    #[test]
    fn inactive_user_cannot_log_in() {
        let repo = setup();
        let auth = AuthService::new(&repo, "test-secret-value", 9);
        auth.register("alice_wonderland", "alice@example.com", "correct-horse-battery").unwrap();
        let err = auth.login("alice_wonderland", "correct-horse-battery").unwrap_err();
        assert!(matches!(err, AuthError::UserInactive));
    }

    #[test]
    fn wrong_password_is_rejected_distinctly_from_not_found() {
        let repo = setup();
        let auth = AuthService::new(&repo, "test-secret-value", 9);
        let user = auth.register("alice_wonderland", "alice@example.com", "correct-horse-battery").unwrap();
        activate(&repo, &user.id);

        assert!(matches!(auth.login("alice_wonderland", "wrong-password-here").unwrap_err(), AuthError::InvalidPassword));
        assert!(matches!(auth.login("nobody_here_at_all", "whatever-password").unwrap_err(), AuthError::UserNotFound));
    }

    #[test]
    fn logout_invalidates_the_session() {
        let repo = setup();
        let auth = AuthService::new(&repo, "test-secret-value", 9);
        let user = auth.register("alice_wonderland", "alice@example.com", "correct-horse-battery").unwrap();
        activate(&repo, &user.id);
        let login = auth.login("alice_wonderland", "correct-horse-battery").unwrap();

        auth.logout(&login.session_id).unwrap();
        assert!(matches!(auth.check_session(&login.session_id).unwrap_err(), AuthError::SessionExpired));
    }

    #[test]
    fn new_login_deactivates_previous_session() {
        let repo = setup();
        let auth = AuthService::new(&repo, "test-secret-value", 9);
        let user = auth.register("alice_wonderland", "alice@example.com", "correct-horse-battery").unwrap();
        activate(&repo, &user.id);

        let first = auth.login("alice_wonderland", "correct-horse-battery").unwrap();
        let _second = auth.login("alice_wonderland", "correct-horse-battery").unwrap();
        assert!(matches!(auth.check_session(&first.session_id).unwrap_err(), AuthError::SessionExpired));
    }
}

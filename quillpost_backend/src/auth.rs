//! Accounts and sessions: signup, login, logout, and resolution of the
//! acting user from an opaque session token.

use crate::database::models::{SessionRecord, UserRecord};
use crate::database::repositories::{SessionRepository, UserRepository};
use crate::database::Database;
use crate::utils::now_utc_iso;
use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use base64::Engine as _;
use rand::RngCore;
use uuid::Uuid;

/// Name of the browser cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

const MIN_PASSWORD_LEN: usize = 8;
const SESSION_TOKEN_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("username is already taken")]
    UsernameTaken,
    #[error("{0}")]
    InvalidUsername(&'static str),
    #[error("{0}")]
    InvalidPassword(&'static str),
    #[error("invalid username or password")]
    BadCredentials,
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// The authenticated identity behind a request. Always passed
/// explicitly to the services that need it.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
}

#[derive(Clone)]
pub struct AuthService {
    database: Database,
}

impl AuthService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn signup(&self, username: &str, password: &str) -> Result<UserRecord, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::InvalidUsername("username may not be empty"));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AuthError::InvalidUsername(
                "username may only contain letters, digits, '_' and '-'",
            ));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidPassword(
                "password must be at least 8 characters long",
            ));
        }

        let taken = self
            .database
            .with_repositories(|repos| repos.users().get_by_username(username))?
            .is_some();
        if taken {
            return Err(AuthError::UsernameTaken);
        }

        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: hash_password(password)?,
            created_at: now_utc_iso(),
        };
        self.database
            .with_repositories(|repos| repos.users().create(&record))?;
        tracing::info!(username = %record.username, "user created");
        Ok(record)
    }

    /// Verifies the credentials and mints a fresh session. The caller
    /// is responsible for handing the token back to the browser.
    pub fn login(&self, username: &str, password: &str) -> Result<(SessionRecord, UserRecord), AuthError> {
        let user = self
            .database
            .with_repositories(|repos| repos.users().get_by_username(username.trim()))?
            .ok_or(AuthError::BadCredentials)?;
        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::BadCredentials);
        }

        let session = SessionRecord {
            token: new_session_token(),
            user_id: user.id.clone(),
            created_at: now_utc_iso(),
        };
        self.database
            .with_repositories(|repos| repos.sessions().create(&session))?;
        Ok((session, user))
    }

    /// Unknown tokens are a no-op; logging out twice is fine.
    pub fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.database
            .with_repositories(|repos| repos.sessions().delete(token))?;
        Ok(())
    }

    pub fn resolve(&self, token: &str) -> Result<Option<CurrentUser>, AuthError> {
        let Some(session) = self
            .database
            .with_repositories(|repos| repos.sessions().get(token))?
        else {
            return Ok(None);
        };
        let user = self
            .database
            .with_repositories(|repos| repos.users().get(&session.user_id))?;
        Ok(user.map(|user| CurrentUser {
            id: user.id,
            username: user.username,
        }))
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| AuthError::Database(anyhow!("failed to hash password: {err}")))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    let hash = match PasswordHash::new(password_hash) {
        Ok(hash) => hash,
        Err(err) => {
            tracing::error!(error = %err, "failed to parse stored password hash");
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok()
}

fn new_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup_service() -> AuthService {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let database = Database::from_connection(conn, true);
        database.ensure_migrations().expect("migrations");
        AuthService::new(database)
    }

    #[test]
    fn signup_then_login_round_trips() {
        let service = setup_service();
        let user = service.signup("ada", "correct horse").expect("signup");
        assert_eq!(user.username, "ada");

        let (session, logged_in) = service.login("ada", "correct horse").expect("login");
        assert_eq!(logged_in.id, user.id);

        let current = service
            .resolve(&session.token)
            .expect("resolve")
            .expect("session valid");
        assert_eq!(current.username, "ada");
    }

    #[test]
    fn wrong_password_is_rejected() {
        let service = setup_service();
        service.signup("ada", "correct horse").expect("signup");
        assert!(matches!(
            service.login("ada", "wrong horse"),
            Err(AuthError::BadCredentials)
        ));
    }

    #[test]
    fn duplicate_usernames_are_rejected() {
        let service = setup_service();
        service.signup("ada", "correct horse").expect("signup");
        assert!(matches!(
            service.signup("ada", "another pass"),
            Err(AuthError::UsernameTaken)
        ));
    }

    #[test]
    fn short_passwords_are_rejected() {
        let service = setup_service();
        assert!(matches!(
            service.signup("ada", "short"),
            Err(AuthError::InvalidPassword(_))
        ));
    }

    #[test]
    fn logout_invalidates_the_session() {
        let service = setup_service();
        service.signup("ada", "correct horse").expect("signup");
        let (session, _) = service.login("ada", "correct horse").expect("login");
        service.logout(&session.token).expect("logout");
        assert!(service.resolve(&session.token).expect("resolve").is_none());
        // A second logout with the same token is a quiet no-op.
        service.logout(&session.token).expect("logout twice");
    }

    #[test]
    fn unknown_tokens_resolve_to_nobody() {
        let service = setup_service();
        assert!(service.resolve("not-a-token").expect("resolve").is_none());
    }
}

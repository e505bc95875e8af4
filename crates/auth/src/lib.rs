use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use feedback_config::AuthConfig;
use feedback_database::{
    timestamp, NewSession, NewUser, SessionRepository, StoreError, User, UserRepository,
};
use rand::RngCore;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Upper bound on session lifetime, roughly a century
const MAX_SESSION_TTL_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Clone)]
pub struct Authenticator {
    users: UserRepository,
    sessions: SessionRepository,
    session_ttl: Duration,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username already exists")]
    UsernameTaken,
    #[error("email already exists")]
    EmailTaken,
    #[error("not authorized")]
    Unauthorized,
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("invalid session")]
    InvalidSession,
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UsernameTaken => AuthError::UsernameTaken,
            StoreError::EmailTaken => AuthError::EmailTaken,
            other => AuthError::Store(other),
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(error: sqlx::Error) -> Self {
        AuthError::Store(StoreError::Database(error))
    }
}

/// Validated registration details; the password is still plaintext here
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

impl Authenticator {
    pub fn new(pool: SqlitePool, config: AuthConfig) -> Self {
        let seconds = config.session_ttl_seconds.min(MAX_SESSION_TTL_SECONDS);
        let session_ttl = Duration::seconds(seconds as i64);

        Self {
            users: UserRepository::new(pool.clone()),
            sessions: SessionRepository::new(pool),
            session_ttl,
        }
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Hash the password, store the new user and open their first session.
    ///
    /// Both rows commit in one transaction or neither does. Duplicate usernames
    /// and emails come back as [`AuthError::UsernameTaken`] and
    /// [`AuthError::EmailTaken`].
    pub async fn register_and_login(
        &self,
        registration: Registration,
    ) -> Result<(User, AuthSession), AuthError> {
        let new_user = new_user(registration)?;
        let (token, expires_at) = self.session_window();

        let mut tx = self.users.pool().begin().await?;
        let user = UserRepository::insert(&mut tx, &new_user).await?;
        SessionRepository::insert(
            &mut tx,
            &NewSession {
                token: token.clone(),
                username: user.username.clone(),
                expires_at: timestamp(expires_at),
            },
        )
        .await?;
        tx.commit().await?;

        info!(username = %user.username, "registered user and opened session");

        let session = AuthSession {
            token,
            username: user.username.clone(),
            expires_at,
        };
        Ok((user, session))
    }

    /// Check a username/password pair.
    ///
    /// Unknown users and wrong passwords both yield `Ok(None)`.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, AuthError> {
        let Some(user) = self.users.find_by_username(username).await? else {
            debug!(username, "login for unknown user");
            return Ok(None);
        };

        if verify_password(password, &user.password_hash) {
            Ok(Some(user))
        } else {
            debug!(username, "login with wrong password");
            Ok(None)
        }
    }

    pub async fn issue_session(&self, username: &str) -> Result<AuthSession, AuthError> {
        let (token, expires_at) = self.session_window();

        self.sessions
            .create(&NewSession {
                token: token.clone(),
                username: username.to_owned(),
                expires_at: timestamp(expires_at),
            })
            .await?;

        debug!(username, "session issued");

        Ok(AuthSession {
            token,
            username: username.to_owned(),
            expires_at,
        })
    }

    /// Look up the user behind a session token, dropping it if it has expired
    pub async fn resolve_session(&self, token: &str) -> Result<(User, AuthSession), AuthError> {
        let Some(record) = self.sessions.find_by_token(token).await? else {
            return Err(AuthError::SessionNotFound);
        };

        let expires_at = DateTime::parse_from_rfc3339(&record.expires_at)
            .map_err(|_| AuthError::InvalidSession)?
            .with_timezone(&Utc);

        if expires_at <= Utc::now() {
            self.sessions.delete(token).await?;
            return Err(AuthError::SessionExpired);
        }

        let user = self
            .users
            .find_by_username(&record.username)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        let session = AuthSession {
            token: record.token,
            username: record.username,
            expires_at,
        };

        Ok((user, session))
    }

    fn session_window(&self) -> (String, DateTime<Utc>) {
        (generate_session_token(), Utc::now() + self.session_ttl)
    }

    /// Forget a session; returns whether it existed
    pub async fn revoke_session(&self, token: &str) -> Result<bool, AuthError> {
        let removed = self.sessions.delete(token).await?;
        if removed {
            debug!("session revoked");
        }
        Ok(removed)
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, AuthError> {
        let removed = self.sessions.delete_expired(Utc::now()).await?;
        info!(removed, "purged expired sessions");
        Ok(removed)
    }
}

/// Allow the action only when the session belongs to `owner`.
///
/// Identity is compared by exact string equality; no session at all is
/// refused the same way as a different user.
pub fn authorize(session_username: Option<&str>, owner: &str) -> Result<(), AuthError> {
    match session_username {
        Some(username) if username == owner => Ok(()),
        _ => Err(AuthError::Unauthorized),
    }
}

fn new_user(registration: Registration) -> Result<NewUser, AuthError> {
    Ok(NewUser {
        password_hash: hash_password(&registration.password)?,
        username: registration.username,
        first_name: registration.first_name,
        last_name: registration.last_name,
        email: registration.email,
    })
}

/// Salted argon2 hash in PHC string form
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// A stored hash that fails to parse never verifies.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(error) => {
            warn!(%error, "stored password hash is malformed");
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

use feedback_auth::Authenticator;
use feedback_config::AuthConfig;
use feedback_database::{FeedbackRepository, UserRepository};
use sqlx::SqlitePool;

/// Name and flags of the cookie that carries the session token
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub name: String,
    pub secure: bool,
}

impl From<&AuthConfig> for SessionCookie {
    fn from(config: &AuthConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            secure: config.secure_cookies,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    users: UserRepository,
    feedback: FeedbackRepository,
    authenticator: Authenticator,
    cookie: SessionCookie,
}

impl AppState {
    pub fn new(pool: SqlitePool, authenticator: Authenticator, auth_config: &AuthConfig) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            feedback: FeedbackRepository::new(pool.clone()),
            pool,
            authenticator,
            cookie: SessionCookie::from(auth_config),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn feedback(&self) -> &FeedbackRepository {
        &self.feedback
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn cookie(&self) -> &SessionCookie {
        &self.cookie
    }
}

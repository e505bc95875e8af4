//! User repository for database operations.

use crate::entities::{NewUser, User};
use crate::types::{timestamp, StoreError, StoreResult};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

const USER_COLUMNS: &str = "username, password_hash, first_name, last_name, email, created_at";

/// Repository for user database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Find user by username
    pub async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Fetch a user that must exist
    pub async fn get(&self, username: &str) -> StoreResult<User> {
        self.find_by_username(username)
            .await?
            .ok_or(StoreError::UserNotFound)
    }

    /// Create new user in its own transaction.
    ///
    /// A rejected registration leaves no row behind.
    pub async fn create(&self, request: &NewUser) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;
        let user = Self::insert(&mut tx, request).await?;
        tx.commit().await?;
        Ok(user)
    }

    /// Uniqueness checks and the insert, on a connection the caller owns.
    ///
    /// Callers pass a transaction when the new row has to commit together
    /// with other writes.
    pub async fn insert(conn: &mut SqliteConnection, request: &NewUser) -> StoreResult<User> {
        let username_taken: Option<String> =
            sqlx::query_scalar("SELECT username FROM users WHERE username = ?")
                .bind(&request.username)
                .fetch_optional(&mut *conn)
                .await?;
        if username_taken.is_some() {
            return Err(StoreError::UsernameTaken);
        }

        let email_taken: Option<String> =
            sqlx::query_scalar("SELECT username FROM users WHERE email = ?")
                .bind(&request.email)
                .fetch_optional(&mut *conn)
                .await?;
        if email_taken.is_some() {
            return Err(StoreError::EmailTaken);
        }

        let now = timestamp(Utc::now());

        sqlx::query(
            "INSERT INTO users (username, password_hash, first_name, last_name, email, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.username)
        .bind(&request.password_hash)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.email)
        .bind(&now)
        .execute(&mut *conn)
        .await
        .map_err(map_unique_violation)?;

        debug!(username = %request.username, "user row created");

        Ok(User {
            username: request.username.clone(),
            password_hash: request.password_hash.clone(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            email: request.email.clone(),
            created_at: now,
        })
    }

    /// List every user, oldest first
    pub async fn list(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, username ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// A concurrent registration can slip past the pre-insert checks; the table
/// constraints still catch it.
fn map_unique_violation(error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.is_unique_violation() {
            return if db_error.message().contains("users.email") {
                StoreError::EmailTaken
            } else {
                StoreError::UsernameTaken
            };
        }
    }
    StoreError::Database(error)
}

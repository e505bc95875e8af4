//! Session repository for database operations.

use crate::entities::{NewSession, SessionRecord};
use crate::types::{timestamp, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

/// Repository for login session rows
#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: &NewSession) -> StoreResult<SessionRecord> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, request).await
    }

    /// Insert on a connection the caller owns, typically an open transaction
    pub async fn insert(
        conn: &mut SqliteConnection,
        request: &NewSession,
    ) -> StoreResult<SessionRecord> {
        let now = timestamp(Utc::now());

        sqlx::query(
            "INSERT INTO sessions (token, username, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&request.token)
        .bind(&request.username)
        .bind(&now)
        .bind(&request.expires_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_error) if db_error.is_foreign_key_violation() => {
                StoreError::UserNotFound
            }
            _ => StoreError::Database(e),
        })?;

        Ok(SessionRecord {
            token: request.token.clone(),
            username: request.username.clone(),
            created_at: now,
            expires_at: request.expires_at.clone(),
        })
    }

    pub async fn find_by_token(&self, token: &str) -> StoreResult<Option<SessionRecord>> {
        let session = sqlx::query_as::<_, SessionRecord>(
            "SELECT token, username, created_at, expires_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Remove a session; returns whether a row existed
    pub async fn delete(&self, token: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove every session that expired at or before `now`
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(timestamp(now))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn count_for_user(&self, username: &str) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

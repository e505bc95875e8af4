//! Feedback repository for database operations.

use crate::entities::{Feedback, FeedbackChanges, NewFeedback, User};
use crate::types::{timestamp, StoreError, StoreResult};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

const FEEDBACK_COLUMNS: &str = "id, title, content, username, created_at, updated_at";

#[derive(Clone)]
pub struct FeedbackRepository {
    pool: SqlitePool,
}

impl FeedbackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a feedback entry owned by `request.username`
    pub async fn create(&self, request: &NewFeedback) -> StoreResult<Feedback> {
        let now = timestamp(Utc::now());

        let result = sqlx::query(
            "INSERT INTO feedback (title, content, username, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&request.title)
        .bind(&request.content)
        .bind(&request.username)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_error) if db_error.is_foreign_key_violation() => {
                StoreError::UserNotFound
            }
            _ => StoreError::Database(e),
        })?;

        Ok(Feedback {
            id: result.last_insert_rowid(),
            title: request.title.clone(),
            content: request.content.clone(),
            username: request.username.clone(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn find_by_id(&self, id: i64) -> StoreResult<Option<Feedback>> {
        let feedback = sqlx::query_as::<_, Feedback>(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(feedback)
    }

    /// Fetch an entry that must exist
    pub async fn get(&self, id: i64) -> StoreResult<Feedback> {
        self.find_by_id(id)
            .await?
            .ok_or(StoreError::FeedbackNotFound(id))
    }

    /// Fetch an entry together with the user who owns it
    pub async fn find_with_owner(&self, id: i64) -> StoreResult<Option<(Feedback, User)>> {
        let row = sqlx::query(
            r#"
            SELECT f.id, f.title, f.content, f.username, f.created_at, f.updated_at,
                   u.password_hash, u.first_name, u.last_name, u.email,
                   u.created_at AS user_created_at
            FROM feedback f
            JOIN users u ON u.username = f.username
            WHERE f.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let feedback = Feedback {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            username: row.try_get("username")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        };
        let owner = User {
            username: feedback.username.clone(),
            password_hash: row.try_get("password_hash")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            created_at: row.try_get("user_created_at")?,
        };

        Ok(Some((feedback, owner)))
    }

    /// Entries owned by `username`, oldest first
    pub async fn list_for_user(&self, username: &str) -> StoreResult<Vec<Feedback>> {
        let feedback = sqlx::query_as::<_, Feedback>(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE username = ? ORDER BY id ASC"
        ))
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        Ok(feedback)
    }

    pub async fn list(&self) -> StoreResult<Vec<Feedback>> {
        let feedback = sqlx::query_as::<_, Feedback>(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(feedback)
    }

    /// Replace title and content; the owner never changes
    pub async fn update(&self, id: i64, changes: &FeedbackChanges) -> StoreResult<Feedback> {
        let now = timestamp(Utc::now());

        let result = sqlx::query(
            "UPDATE feedback SET title = ?, content = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&changes.title)
        .bind(&changes.content)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::FeedbackNotFound(id));
        }

        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM feedback WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::FeedbackNotFound(id));
        }

        Ok(())
    }
}

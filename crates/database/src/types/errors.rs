//! Error types for the database layer

use thiserror::Error;

/// Failures while bringing the database up
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),
}

/// Repository errors surfaced to the auth and HTTP layers
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Username already exists")]
    UsernameTaken,

    #[error("Email already exists")]
    EmailTaken,

    #[error("User not found")]
    UserNotFound,

    #[error("Feedback {0} not found")]
    FeedbackNotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

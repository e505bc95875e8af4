//! Feedback Database Crate
//!
//! Connection management, migrations, and the repositories backing users,
//! feedback entries, and login sessions.

use feedback_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::run_migrations;

pub use repos::{FeedbackRepository, SessionRepository, UserRepository};

pub use entities::{
    feedback::{Feedback, FeedbackChanges, NewFeedback},
    session::{NewSession, SessionRecord},
    user::{NewUser, User},
};

pub use types::{
    errors::{DatabaseError, StoreError},
    timestamp, DatabaseResult, StoreResult,
};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}

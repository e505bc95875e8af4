//! Feedback entity definitions

use serde::{Deserialize, Serialize};

/// A feedback entry owned by exactly one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feedback {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub username: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub title: String,
    pub content: String,
    pub username: String,
}

/// Editable fields of an existing entry
#[derive(Debug, Clone)]
pub struct FeedbackChanges {
    pub title: String,
    pub content: String,
}

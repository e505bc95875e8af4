use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use feedback_auth::AuthError;
use feedback_database::StoreError;
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal_server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(error: sqlx::Error) -> Self {
        error!(error = ?error, "database error");
        Self::internal_server_error()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UsernameTaken | StoreError::EmailTaken => Self::conflict(error.to_string()),
            StoreError::UserNotFound | StoreError::FeedbackNotFound(_) => {
                Self::not_found(error.to_string())
            }
            StoreError::Database(inner) => inner.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Unauthorized
            | AuthError::SessionNotFound
            | AuthError::SessionExpired
            | AuthError::InvalidSession => {
                warn!(error = %error, "request not authorized");
                Self::unauthorized("unauthorized")
            }
            AuthError::UsernameTaken | AuthError::EmailTaken => Self::conflict(error.to_string()),
            AuthError::Store(inner) => inner.into(),
            AuthError::PasswordHash(_) => {
                error!(error = ?error, "password hashing failed");
                Self::internal_server_error()
            }
        }
    }
}

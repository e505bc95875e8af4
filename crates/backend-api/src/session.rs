use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use feedback_auth::{authorize, AuthError};
use feedback_database::User;
use tracing::debug;

use crate::{ApiError, AppState};

/// Who is making the request, resolved from the session cookie.
///
/// A missing, unknown or expired session yields an anonymous context rather
/// than a rejection; handlers decide what needs a logged-in user.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    user: Option<User>,
    token: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: User, token: String) -> Self {
        Self {
            user: Some(user),
            token: Some(token),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.username.as_str())
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn require_user(&self) -> Result<&User, ApiError> {
        self.user
            .as_ref()
            .ok_or_else(|| ApiError::unauthorized("login required"))
    }

    /// Fails unless the session belongs to `owner`
    pub fn authorize(&self, owner: &str) -> Result<(), ApiError> {
        authorize(self.username(), owner).map_err(ApiError::from)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(token) = jar
            .get(&state.cookie().name)
            .map(|cookie| cookie.value().to_owned())
            .filter(|token| !token.is_empty())
        else {
            return Ok(Self::anonymous());
        };

        match state.authenticator().resolve_session(&token).await {
            Ok((user, _)) => Ok(Self::authenticated(user, token)),
            Err(
                error @ (AuthError::SessionNotFound
                | AuthError::SessionExpired
                | AuthError::InvalidSession),
            ) => {
                debug!(error = %error, "ignoring stale session cookie");
                Ok(Self::anonymous())
            }
            Err(error) => Err(error.into()),
        }
    }
}

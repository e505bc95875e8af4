use axum::extract::rejection::FormRejection;
use axum::Form;
use axum_extra::extract::cookie::{Cookie, SameSite};
use tracing::debug;

use crate::state::SessionCookie;

pub const REGISTER_PATH: &str = "/register";
pub const LOGIN_PATH: &str = "/login";

pub fn user_page(username: &str) -> String {
    format!("/users/{username}")
}

/// The submitted form, or an empty one when the body could not be read.
///
/// Handlers take the body this way so identity checks run before any body
/// parsing; an empty form then fails validation like any other.
pub fn submitted<T: Default>(body: Result<Form<T>, FormRejection>) -> T {
    match body {
        Ok(Form(form)) => form,
        Err(rejection) => {
            debug!(%rejection, "unreadable form body");
            T::default()
        }
    }
}

pub fn session_cookie(config: &SessionCookie, token: String) -> Cookie<'static> {
    Cookie::build((config.name.clone(), token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure)
        .path("/")
        .build()
}

/// A cookie that, once set, makes the client drop the session cookie
pub fn removal_cookie(config: &SessionCookie) -> Cookie<'static> {
    Cookie::build((config.name.clone(), ""))
        .path("/")
        .build()
}

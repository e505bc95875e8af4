use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use feedback_auth::AuthError;
use tracing::info;

use crate::{
    forms::{FormErrors, LoginForm, RegisterForm, WebForm, INVALID_LOGIN_MESSAGE},
    session::RequestContext,
    util::{removal_cookie, session_cookie, submitted, user_page, LOGIN_PATH, REGISTER_PATH},
    views::FormView,
    ApiError, AppState,
};

pub async fn home() -> Redirect {
    Redirect::to(REGISTER_PATH)
}

pub async fn register_form(ctx: RequestContext) -> Response {
    match ctx.username() {
        Some(username) => Redirect::to(&user_page(username)).into_response(),
        None => FormView::new(&RegisterForm::default(), REGISTER_PATH).into_response(),
    }
}

pub async fn register(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: CookieJar,
    body: Result<Form<RegisterForm>, FormRejection>,
) -> Result<Response, ApiError> {
    if let Some(username) = ctx.username() {
        return Ok(Redirect::to(&user_page(username)).into_response());
    }

    let form = submitted(body);
    let view = FormView::new(&form, REGISTER_PATH);
    let registration = match form.validate() {
        Ok(registration) => registration,
        Err(errors) => {
            return Ok(view
                .with_errors(errors)
                .respond(StatusCode::UNPROCESSABLE_ENTITY))
        }
    };

    let (user, session) = match state.authenticator().register_and_login(registration).await {
        Ok(created) => created,
        Err(AuthError::UsernameTaken) => {
            return Ok(view
                .with_errors(FormErrors::single("username", "Username is already taken."))
                .respond(StatusCode::CONFLICT));
        }
        Err(AuthError::EmailTaken) => {
            return Ok(view
                .with_errors(FormErrors::single("email", "Email is already registered."))
                .respond(StatusCode::CONFLICT));
        }
        Err(error) => return Err(error.into()),
    };

    info!(username = %user.username, "signed up and logged in");

    let jar = jar.add(session_cookie(state.cookie(), session.token));
    Ok((jar, Redirect::to(&user_page(&user.username))).into_response())
}

pub async fn login_form(ctx: RequestContext) -> Response {
    match ctx.username() {
        Some(username) => Redirect::to(&user_page(username)).into_response(),
        None => FormView::new(&LoginForm::default(), LOGIN_PATH).into_response(),
    }
}

pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: CookieJar,
    body: Result<Form<LoginForm>, FormRejection>,
) -> Result<Response, ApiError> {
    if let Some(username) = ctx.username() {
        return Ok(Redirect::to(&user_page(username)).into_response());
    }

    let form = submitted(body);
    let view = FormView::new(&form, LOGIN_PATH);
    let credentials = match form.validate() {
        Ok(credentials) => credentials,
        Err(errors) => {
            return Ok(view
                .with_errors(errors)
                .respond(StatusCode::UNPROCESSABLE_ENTITY))
        }
    };

    let Some(user) = state
        .authenticator()
        .authenticate(&credentials.username, &credentials.password)
        .await?
    else {
        return Ok(view
            .with_errors(FormErrors::single("username", INVALID_LOGIN_MESSAGE))
            .respond(StatusCode::UNAUTHORIZED));
    };

    let session = state.authenticator().issue_session(&user.username).await?;
    info!(username = %user.username, "logged in");

    let jar = jar.add(session_cookie(state.cookie(), session.token));
    Ok((jar, Redirect::to(&user_page(&user.username))).into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    if let Some(token) = ctx.token() {
        state.authenticator().revoke_session(token).await?;
        info!(username = ctx.username().unwrap_or_default(), "logged out");
    }

    let jar = jar.remove(removal_cookie(state.cookie()));
    Ok((jar, Redirect::to(LOGIN_PATH)))
}

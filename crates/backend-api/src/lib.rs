mod error;
mod state;
mod util;

pub mod forms;
pub mod routes;
pub mod session;
pub mod views;

pub use error::ApiError;
pub use session::RequestContext;
pub use state::{AppState, SessionCookie};

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::auth::home))
        .route(
            "/register",
            get(routes::auth::register_form).post(routes::auth::register),
        )
        .route(
            "/login",
            get(routes::auth::login_form).post(routes::auth::login),
        )
        .route("/logout", get(routes::auth::logout))
        .route("/users/:username", get(routes::users::show_user))
        .route(
            "/users/:username/feedback/new",
            get(routes::feedback::new_feedback_form).post(routes::feedback::create_feedback),
        )
        .route(
            "/feedback/:id/update",
            get(routes::feedback::edit_feedback_form).post(routes::feedback::update_feedback),
        )
        .route("/feedback/:id/delete", post(routes::feedback::delete_feedback))
        .route("/health", get(routes::health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

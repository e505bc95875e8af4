use axum::{
    extract::{rejection::FormRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use feedback_database::{Feedback, StoreError};
use tracing::info;

use crate::{
    forms::{DeleteForm, FeedbackForm, WebForm},
    session::RequestContext,
    util::{submitted, user_page},
    views::FormView,
    ApiError, AppState,
};

fn new_feedback_path(username: &str) -> String {
    format!("/users/{username}/feedback/new")
}

fn update_path(id: i64) -> String {
    format!("/feedback/{id}/update")
}

/// Load an entry for its owner.
///
/// No session is refused before the lookup; a missing entry is a 404; anyone
/// but the owner is refused.
async fn owned_feedback(
    state: &AppState,
    ctx: &RequestContext,
    id: i64,
) -> Result<Feedback, ApiError> {
    ctx.require_user()?;
    let (feedback, owner) = state
        .feedback()
        .find_with_owner(id)
        .await?
        .ok_or(StoreError::FeedbackNotFound(id))?;
    ctx.authorize(&owner.username)?;
    Ok(feedback)
}

pub async fn new_feedback_form(
    ctx: RequestContext,
    Path(username): Path<String>,
) -> Result<FormView, ApiError> {
    ctx.authorize(&username)?;
    Ok(FormView::new(
        &FeedbackForm::default(),
        new_feedback_path(&username),
    ))
}

pub async fn create_feedback(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(username): Path<String>,
    body: Result<Form<FeedbackForm>, FormRejection>,
) -> Result<Response, ApiError> {
    ctx.authorize(&username)?;
    let form = submitted(body);

    let draft = match form.validate() {
        Ok(draft) => draft,
        Err(errors) => {
            return Ok(FormView::new(&form, new_feedback_path(&username))
                .with_errors(errors)
                .respond(StatusCode::UNPROCESSABLE_ENTITY))
        }
    };

    let feedback = state.feedback().create(&draft.into_new(&username)).await?;
    info!(id = feedback.id, username = %feedback.username, "feedback created");

    Ok(Redirect::to(&user_page(&feedback.username)).into_response())
}

pub async fn edit_feedback_form(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> Result<FormView, ApiError> {
    let feedback = owned_feedback(&state, &ctx, id).await?;
    Ok(FormView::new(&FeedbackForm::from(&feedback), update_path(id)))
}

pub async fn update_feedback(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
    body: Result<Form<FeedbackForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let feedback = owned_feedback(&state, &ctx, id).await?;
    let form = submitted(body);

    let draft = match form.validate() {
        Ok(draft) => draft,
        Err(errors) => {
            return Ok(FormView::new(&form, update_path(id))
                .with_errors(errors)
                .respond(StatusCode::UNPROCESSABLE_ENTITY))
        }
    };

    let updated = state.feedback().update(feedback.id, &draft.into_changes()).await?;
    info!(id = updated.id, username = %updated.username, "feedback updated");

    Ok(Redirect::to(&user_page(&updated.username)).into_response())
}

pub async fn delete_feedback(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
    body: Result<Form<DeleteForm>, FormRejection>,
) -> Result<Redirect, ApiError> {
    let feedback = owned_feedback(&state, &ctx, id).await?;
    // No fields to check; any body, or none, confirms the delete.
    let _: DeleteForm = submitted(body);

    state.feedback().delete(feedback.id).await?;
    info!(id = feedback.id, username = %feedback.username, "feedback deleted");

    Ok(Redirect::to(&user_page(&feedback.username)))
}

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{session::RequestContext, views::UserPage, ApiError, AppState};

/// Profile and feedback list; only the user themselves may see it
pub async fn show_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(username): Path<String>,
) -> Result<Json<UserPage>, ApiError> {
    ctx.authorize(&username)?;

    let user = state.users().get(&username).await?;
    let feedback = state.feedback().list_for_user(&username).await?;

    Ok(Json(UserPage::new(user, feedback)))
}

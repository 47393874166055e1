//! Comment submission

use axum::{
    extract::{Path, State},
    response::Redirect,
    Form,
};

use super::forms::CommentForm;
use super::middleware::{AppError, AppState, CurrentUser};
use super::posts::post_url;
use crate::services::CommentServiceError;

/// POST /posts/{id}/comment/
///
/// Both success and a blank comment lead back to the post.
pub async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Result<Redirect, AppError> {
    match state.comment_service.add(&user, id, &form.text).await {
        Ok(_) => {}
        Err(CommentServiceError::ValidationError(message)) => {
            tracing::debug!(post_id = id, user_id = user.id, "Comment rejected: {}", message);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Redirect::to(&post_url(id)))
}

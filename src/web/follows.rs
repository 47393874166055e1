//! Follow and unfollow

use axum::{
    extract::{Path, State},
    response::Redirect,
};

use super::middleware::{AppError, AppState, CurrentUser};
use super::posts::profile_url;
use crate::services::FollowOutcome;

/// GET /profile/{username}/follow/
pub async fn profile_follow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Redirect, AppError> {
    let outcome = state.follow_service.follow(&user, &username).await?;
    if outcome != FollowOutcome::Created {
        tracing::debug!(user_id = user.id, author = %username, ?outcome, "Follow ignored");
    }

    Ok(Redirect::to(&profile_url(&username)))
}

/// GET /profile/{username}/unfollow/
pub async fn profile_unfollow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Redirect, AppError> {
    state.follow_service.unfollow(&user, &username).await?;
    Ok(Redirect::to(&profile_url(&username)))
}

//! Admin-only maintenance endpoints

use axum::{extract::State, response::Redirect};

use super::middleware::{AppError, AppState, CurrentUser};

/// POST /admin/cache/clear/
///
/// Drops the cached index pages of every viewer.
pub async fn clear_cache(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Redirect, AppError> {
    if !user.is_admin() {
        tracing::warn!(user_id = user.id, "Non-admin tried to clear the cache");
        return Err(AppError::Forbidden);
    }

    state.post_service.clear_index_cache().await?;
    tracing::info!(user_id = user.id, "Index cache cleared");
    Ok(Redirect::to("/"))
}

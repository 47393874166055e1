//! Template-only pages and the catch-all 404

use axum::{extract::State, http::Uri, response::Html};
use tera::Context as TeraContext;

use super::middleware::{AppError, AppState, MaybeUser};

/// GET /about/author/
pub async fn about_author(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    uri: Uri,
) -> Result<Html<String>, AppError> {
    state.render("about/author.html", &TeraContext::new(), uri.path(), user.as_ref())
}

/// GET /about/tech/
pub async fn about_tech(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    uri: Uri,
) -> Result<Html<String>, AppError> {
    state.render("about/tech.html", &TeraContext::new(), uri.path(), user.as_ref())
}

/// Router fallback
pub async fn not_found(uri: Uri) -> AppError {
    tracing::debug!(path = %uri.path(), "No route matched");
    AppError::NotFound
}

//! Shared web state, the current-user middleware and extractors, and
//! the error type handlers return.
//!
//! The session cookie is resolved once per request by
//! [`load_current_user`]; handlers then take [`CurrentUser`] (login
//! required) or [`MaybeUser`] (anyone).

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use std::convert::Infallible;
use std::sync::Arc;
use tera::Context as TeraContext;

use crate::cache::Cache;
use crate::config::{Config, SiteConfig};
use crate::db::repositories::{
    SqlxCommentRepository, SqlxFollowRepository, SqlxGroupRepository, SqlxPostRepository,
    SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    CommentService, CommentServiceError, FollowService, FollowServiceError, GroupService,
    MediaStore, PostService, PostServiceError, UserService, UserServiceError,
};
use crate::templates::{PageVars, TemplateEngine};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<Cache>,
    pub user_service: Arc<UserService>,
    pub group_service: Arc<GroupService>,
    pub post_service: Arc<PostService>,
    pub comment_service: Arc<CommentService>,
    pub follow_service: Arc<FollowService>,
    pub media: Arc<MediaStore>,
    pub templates: Arc<TemplateEngine>,
    pub site: Arc<SiteConfig>,
}

impl AppState {
    /// Wire repositories and services over an open pool and cache
    pub fn new(pool: DynDatabasePool, cache: Arc<Cache>, templates: TemplateEngine, config: &Config) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let group_repo = SqlxGroupRepository::boxed(pool.clone());
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool.clone());
        let follow_repo = SqlxFollowRepository::boxed(pool);

        let user_service =
            UserService::with_session_days(user_repo.clone(), session_repo, config.site.session_days);
        let post_service = PostService::with_index_ttl(
            post_repo.clone(),
            group_repo.clone(),
            user_repo.clone(),
            cache.clone(),
            config.site.post_limit,
            std::time::Duration::from_secs(config.cache.index_ttl_seconds),
        );

        Self {
            cache,
            user_service: Arc::new(user_service),
            group_service: Arc::new(GroupService::new(group_repo)),
            post_service: Arc::new(post_service),
            comment_service: Arc::new(CommentService::new(comment_repo, post_repo)),
            follow_service: Arc::new(FollowService::new(follow_repo, user_repo)),
            media: Arc::new(MediaStore::new(config.media.clone())),
            templates: Arc::new(templates),
            site: Arc::new(config.site.clone()),
        }
    }

    pub fn page_vars(&self, path: &str, user: Option<&User>) -> PageVars {
        PageVars::new(&self.site.name, &self.site.description, path).with_user(user)
    }

    /// Render a page template for the given viewer
    pub fn render(
        &self,
        template: &str,
        context: &TeraContext,
        path: &str,
        user: Option<&User>,
    ) -> Result<Html<String>, AppError> {
        let vars = self.page_vars(path, user);
        let html = self.templates.render_page(template, context, &vars)?;
        Ok(Html(html))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors a handler can end with; rendered as error pages
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Marks a response whose body should be replaced by an error page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPage(pub StatusCode);

impl ErrorPage {
    fn template(self) -> &'static str {
        match self.0 {
            StatusCode::NOT_FOUND => "core/404.html",
            StatusCode::FORBIDDEN => "core/403.html",
            _ => "core/500.html",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut response = status.into_response();
        response.extensions_mut().insert(ErrorPage(status));
        response
    }
}

impl From<PostServiceError> for AppError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(_) | PostServiceError::RelatedNotFound(_) => AppError::NotFound,
            PostServiceError::Forbidden(_) => AppError::Forbidden,
            other @ PostServiceError::ValidationError { .. } => AppError::Internal(anyhow::anyhow!(other.to_string())),
            PostServiceError::InternalError(e) => AppError::Internal(e),
        }
    }
}

impl From<CommentServiceError> for AppError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::PostNotFound(_) => AppError::NotFound,
            other @ CommentServiceError::ValidationError(_) => AppError::Internal(anyhow::anyhow!(other.to_string())),
            CommentServiceError::InternalError(e) => AppError::Internal(e),
        }
    }
}

impl From<FollowServiceError> for AppError {
    fn from(err: FollowServiceError) -> Self {
        match err {
            FollowServiceError::UserNotFound(_) => AppError::NotFound,
            FollowServiceError::InternalError(e) => AppError::Internal(e),
        }
    }
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::InternalError(e) => AppError::Internal(e),
            other => AppError::Internal(anyhow::anyhow!(other.to_string())),
        }
    }
}

/// Replace the body of marked error responses with the matching template
pub async fn render_error_pages(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let user = request.extensions().get::<AuthenticatedUser>().map(|u| u.0.clone());

    let response = next.run(request).await;
    let Some(page) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };

    let vars = state.page_vars(&path, user.as_ref());
    let html = state
        .templates
        .render_with_fallback(page.template(), &TeraContext::new(), &vars);
    (page.0, Html(html)).into_response()
}

// ============================================================================
// Current user
// ============================================================================

/// The user owning the request's session, stored in request extensions
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Extract the session token from the `Cookie` header
pub fn extract_session_token(headers: &axum::http::HeaderMap) -> Option<String> {
    let prefix = format!("{}=", SESSION_COOKIE);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().strip_prefix(prefix.as_str()))
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

/// Resolve the session cookie to a user, if any
pub async fn load_current_user(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session validation failed: {}", e),
        }
    }
    next.run(request).await
}

/// Logged-in user; anonymous requests are redirected to the login page
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = LoginRedirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthenticatedUser>() {
            Some(user) => Ok(CurrentUser(user.0.clone())),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| "/".to_string());
                Err(LoginRedirect { next })
            }
        }
    }
}

/// Logged-in user, if there is one
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<AuthenticatedUser>().map(|u| u.0.clone())))
    }
}

/// `302 Found` to the login page, remembering where the user was going
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub next: String,
}

impl LoginRedirect {
    pub fn location(&self) -> String {
        format!("/auth/login/?next={}", encode_next(&self.next))
    }
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        (StatusCode::FOUND, [(header::LOCATION, self.location())]).into_response()
    }
}

/// Percent-encode a local path for a query value, keeping `/` readable
pub fn encode_next(path: &str) -> String {
    urlencoding::encode(path).replace("%2F", "/")
}

/// Only local absolute paths are followed after login
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => path,
        _ => "/",
    }
}

//! Web layer - HTML handlers and routing
//!
//! Every page is server-rendered with Tera. Handlers take the current
//! user through the [`CurrentUser`] / [`MaybeUser`] extractors and end
//! with an [`AppError`] that is turned into an error page.

pub mod admin;
pub mod auth;
pub mod comments;
pub mod follows;
pub mod forms;
pub mod media;
pub mod middleware;
pub mod pages;
pub mod posts;


use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use middleware::{AppError, AppState, CurrentUser, LoginRedirect, MaybeUser, SESSION_COOKIE};

/// Room for form fields next to the largest allowed image
const FORM_OVERHEAD_BYTES: u64 = 1024 * 1024;

fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(posts::index))
        .route("/group/{slug}/", get(posts::group_list))
        .route("/profile/{username}/", get(posts::profile))
        .route("/profile/{username}/follow/", get(follows::profile_follow))
        .route("/profile/{username}/unfollow/", get(follows::profile_unfollow))
        .route("/follow/", get(posts::follow_index))
        .route("/create/", get(posts::post_create_form).post(posts::post_create))
        .route("/posts/{id}/", get(posts::post_detail))
        .route("/posts/{id}/edit/", get(posts::post_edit_form).post(posts::post_edit))
        .route("/posts/{id}/delete/", post(posts::post_delete))
        .route("/posts/{id}/comment/", post(comments::add_comment))
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup/", get(auth::signup_form).post(auth::signup))
        .route("/login/", get(auth::login_form).post(auth::login))
        .route("/logout/", get(auth::logout).post(auth::logout))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.media.max_file_size() + FORM_OVERHEAD_BYTES;

    Router::new()
        .merge(post_routes())
        .nest("/auth", auth_routes())
        .route("/about/author/", get(pages::about_author))
        .route("/about/tech/", get(pages::about_tech))
        .route("/admin/cache/clear/", post(admin::clear_cache))
        .route("/media/{*path}", get(media::serve_media))
        .fallback(pages::not_found)
        .layer(DefaultBodyLimit::max(body_limit as usize))
        // Inside load_current_user: error pages show the viewer
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::render_error_pages,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::load_current_user,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

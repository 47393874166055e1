//! Post pages: listings, detail, create, edit and delete

use axum::{
    extract::{Path, Query, State},
    http::Uri,
    response::{Html, IntoResponse, Redirect, Response},
};
use tera::Context as TeraContext;

use super::forms::{FieldErrors, PageQuery, PostForm, PostFormValues, PostSubmission, ValidPostForm};
use super::middleware::{AppError, AppState, CurrentUser, MaybeUser};
use crate::models::{Post, User};
use crate::services::{PostDraft, PostServiceError};

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

pub fn post_url(id: i64) -> String {
    format!("/posts/{}/", id)
}

/// GET / - latest posts, served from the index cache
pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let vars = state.page_vars(uri.path(), user.as_ref());
    let html = state
        .post_service
        .render_index(user.as_ref().map(|u| u.id), query.page.as_deref(), |page| {
            let mut context = TeraContext::new();
            context.insert("page", &page);
            state.templates.render_page("posts/index.html", &context, &vars)
        })
        .await?;

    Ok(Html(html))
}

/// GET /group/{slug}/
pub async fn group_list(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    uri: Uri,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let (group, page) = state.post_service.group_page(&slug, query.page.as_deref()).await?;

    let mut context = TeraContext::new();
    context.insert("group", &group);
    context.insert("page", &page);
    state.render("posts/group_list.html", &context, uri.path(), user.as_ref())
}

/// GET /profile/{username}/
pub async fn profile(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    uri: Uri,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let (author, page) = state.post_service.profile(&username, query.page.as_deref()).await?;

    let following = match &user {
        Some(viewer) if viewer.id != author.id => {
            state.follow_service.is_following(viewer.id, author.id).await?
        }
        _ => false,
    };
    let is_self = user.as_ref().is_some_and(|viewer| viewer.id == author.id);

    let mut context = TeraContext::new();
    context.insert("author", &author);
    context.insert("page", &page);
    context.insert("following", &following);
    context.insert("is_self", &is_self);
    state.render("posts/profile.html", &context, uri.path(), user.as_ref())
}

/// GET /posts/{id}/
pub async fn post_detail(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<Html<String>, AppError> {
    let post = state.post_service.get(id).await?;
    let comments = state.comment_service.list(id).await?;

    let can_edit = user.as_ref().is_some_and(|u| u.id == post.author.id);
    let can_delete = user.as_ref().is_some_and(|u| u.can_delete(post.author.id));

    let mut context = TeraContext::new();
    context.insert("post", &post);
    context.insert("comments", &comments);
    context.insert("can_edit", &can_edit);
    context.insert("can_delete", &can_delete);
    state.render("posts/post_detail.html", &context, uri.path(), user.as_ref())
}

/// GET /follow/ - posts by followed authors, never cached
pub async fn follow_index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let page = state.post_service.follow_feed(&user, query.page.as_deref()).await?;

    let mut context = TeraContext::new();
    context.insert("page", &page);
    state.render("posts/follow.html", &context, uri.path(), Some(&user))
}

// ============================================================================
// Create / edit
// ============================================================================

/// Everything the post form template needs besides the page variables
struct PostFormPage<'a> {
    values: PostFormValues,
    errors: FieldErrors,
    /// Set when editing
    post: Option<&'a Post>,
}

async fn render_post_form(
    state: &AppState,
    user: &User,
    path: &str,
    page: PostFormPage<'_>,
) -> Result<Html<String>, AppError> {
    let groups = state.group_service.list().await?;

    let mut context = TeraContext::new();
    context.insert("form", &page.values);
    context.insert("errors", &page.errors);
    context.insert("groups", &groups);
    context.insert("is_edit", &page.post.is_some());
    context.insert("post_id", &page.post.map(|p| p.id));
    context.insert("current_image", &page.post.and_then(|p| p.image.as_deref()));
    state.render("posts/create_post.html", &context, path, Some(user))
}

/// Store the uploaded image (if any) and build the draft for the service
async fn prepare_draft(state: &AppState, form: ValidPostForm) -> Result<PostDraft, FieldErrors> {
    let image = match form.image {
        Some(upload) => match state.media.save_image(&upload.data).await {
            Ok(path) => {
                tracing::debug!(
                    file_name = %upload.file_name,
                    declared = %upload.content_type,
                    path = %path,
                    "Post image uploaded"
                );
                Some(path)
            }
            Err(e) => {
                tracing::warn!("Failed to store upload {}: {}", upload.file_name, e);
                let mut errors = FieldErrors::new();
                errors.insert("image".into(), super::forms::image_error_message(&e));
                return Err(errors);
            }
        },
        None => None,
    };

    Ok(PostDraft {
        text: form.text,
        group_id: form.group_id,
        image,
    })
}

/// Validate, store the image, then hand the draft to `save`
///
/// A rejected draft removes the stored image again and yields field errors.
async fn submit_post<F, Fut>(state: &AppState, form: PostForm, save: F) -> Result<Result<Post, FieldErrors>, AppError>
where
    F: FnOnce(PostDraft) -> Fut,
    Fut: std::future::Future<Output = Result<Post, PostServiceError>>,
{
    let valid = match form.validate(&state.media) {
        Ok(valid) => valid,
        Err(errors) => return Ok(Err(errors)),
    };
    let draft = match prepare_draft(state, valid).await {
        Ok(draft) => draft,
        Err(errors) => return Ok(Err(errors)),
    };
    let stored_image = draft.image.clone();

    match save(draft).await {
        Ok(post) => Ok(Ok(post)),
        Err(err) => {
            if let Some(path) = stored_image {
                if let Err(e) = state.media.remove(&path).await {
                    tracing::warn!("Failed to remove rejected upload {}: {}", path, e);
                }
            }
            match err {
                PostServiceError::ValidationError { field, message } => {
                    let mut errors = FieldErrors::new();
                    errors.insert(field.to_string(), message);
                    Ok(Err(errors))
                }
                other => Err(other.into()),
            }
        }
    }
}

/// GET /create/
pub async fn post_create_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    uri: Uri,
) -> Result<Html<String>, AppError> {
    let page = PostFormPage {
        values: PostFormValues::default(),
        errors: FieldErrors::new(),
        post: None,
    };
    render_post_form(&state, &user, uri.path(), page).await
}

/// POST /create/
pub async fn post_create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    uri: Uri,
    PostSubmission(form): PostSubmission,
) -> Result<Response, AppError> {
    let values = form.values();
    let service = state.post_service.clone();
    let author = user.clone();

    match submit_post(&state, form, |draft| async move { service.create(&author, draft).await }).await? {
        Ok(_) => Ok(Redirect::to(&profile_url(&user.username)).into_response()),
        Err(errors) => {
            let page = PostFormPage {
                values,
                errors,
                post: None,
            };
            Ok(render_post_form(&state, &user, uri.path(), page).await?.into_response())
        }
    }
}

/// GET /posts/{id}/edit/
pub async fn post_edit_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<Html<String>, AppError> {
    let post = state.post_service.get_for_edit(&user, id).await?;

    let page = PostFormPage {
        values: PostFormValues {
            text: post.text.clone(),
            group_id: post.group_id,
        },
        errors: FieldErrors::new(),
        post: Some(&post),
    };
    render_post_form(&state, &user, uri.path(), page).await
}

/// POST /posts/{id}/edit/
pub async fn post_edit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    uri: Uri,
    Path(id): Path<i64>,
    PostSubmission(form): PostSubmission,
) -> Result<Response, AppError> {
    let existing = state.post_service.get_for_edit(&user, id).await?;
    let values = form.values();
    let service = state.post_service.clone();
    let editor = user.clone();

    let result = submit_post(&state, form, |draft| async move { service.update(&editor, id, draft).await }).await?;
    match result {
        Ok(updated) => {
            // A replaced image is no longer referenced
            if let Some(old) = existing.image.as_deref() {
                if updated.image.as_deref() != Some(old) {
                    if let Err(e) = state.media.remove(old).await {
                        tracing::warn!("Failed to remove replaced image {}: {}", old, e);
                    }
                }
            }
            Ok(Redirect::to(&post_url(id)).into_response())
        }
        Err(errors) => {
            let page = PostFormPage {
                values,
                errors,
                post: Some(&existing),
            };
            Ok(render_post_form(&state, &user, uri.path(), page).await?.into_response())
        }
    }
}

/// POST /posts/{id}/delete/
pub async fn post_delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    let post = state.post_service.get(id).await?;
    let deleted = state.post_service.delete(&user, id).await?;

    if let Some(image) = deleted.image.as_deref() {
        if let Err(e) = state.media.remove(image).await {
            tracing::warn!("Failed to remove image of deleted post {}: {}", id, e);
        }
    }

    Ok(Redirect::to(&profile_url(&post.author.username)))
}

//! Signup, login and logout pages
//!
//! A successful signup or login sets an `HttpOnly` `session` cookie that
//! `load_current_user` resolves on later requests.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use super::forms::{FieldErrors, LoginForm, SignupForm};
use super::middleware::{extract_session_token, safe_next, AppError, AppState, MaybeUser, SESSION_COOKIE};
use crate::models::{Session, User};
use crate::services::{LoginInput, RegisterInput, UserServiceError};

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

fn session_cookie(session: &Session, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, session.id, max_age_secs
    )
}

fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Redirect to `target`, carrying the new session cookie
fn logged_in(state: &AppState, session: &Session, target: &str) -> Response {
    let cookie = session_cookie(session, state.user_service.session_max_age().num_seconds());
    ([(header::SET_COOKIE, cookie)], Redirect::to(target)).into_response()
}

fn render_signup(
    state: &AppState,
    path: &str,
    user: Option<&User>,
    form: &SignupForm,
    errors: &FieldErrors,
) -> Result<Html<String>, AppError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    state.render("users/signup.html", &context, path, user)
}

fn render_login(
    state: &AppState,
    path: &str,
    user: Option<&User>,
    form: &LoginForm,
    errors: &FieldErrors,
) -> Result<Html<String>, AppError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("next", form.next.as_deref().unwrap_or(""));
    state.render("users/login.html", &context, path, user)
}

/// GET /auth/signup/
pub async fn signup_form(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    uri: Uri,
) -> Result<Html<String>, AppError> {
    render_signup(&state, uri.path(), user.as_ref(), &SignupForm::default(), &FieldErrors::new())
}

/// POST /auth/signup/
pub async fn signup(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    uri: Uri,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(render_signup(&state, uri.path(), viewer.as_ref(), &form, &errors)?.into_response());
    }

    let input = RegisterInput::new(form.username.trim(), form.email.trim(), form.password1.as_str());
    let user = match state.user_service.register(input).await {
        Ok(user) => user,
        Err(UserServiceError::ValidationError { field, message })
        | Err(UserServiceError::UserExists { field, message }) => {
            let field = if field == "password" { "password1" } else { field };
            let mut errors = FieldErrors::new();
            errors.insert(field.to_string(), message);
            return Ok(render_signup(&state, uri.path(), viewer.as_ref(), &form, &errors)?.into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let session = state.user_service.start_session(user.id).await?;
    Ok(logged_in(&state, &session, "/"))
}

/// GET /auth/login/
pub async fn login_form(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    uri: Uri,
    Query(query): Query<NextQuery>,
) -> Result<Html<String>, AppError> {
    let form = LoginForm {
        next: query.next,
        ..Default::default()
    };
    render_login(&state, uri.path(), user.as_ref(), &form, &FieldErrors::new())
}

/// POST /auth/login/
pub async fn login(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    uri: Uri,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let input = LoginInput::new(form.username.as_str(), form.password.as_str());
    match state.user_service.login(input).await {
        Ok(session) => {
            tracing::info!(user_id = session.user_id, "User logged in");
            let target = safe_next(form.next.as_deref());
            Ok(logged_in(&state, &session, target))
        }
        Err(UserServiceError::AuthenticationError(message)) => {
            let mut errors = FieldErrors::new();
            errors.insert("general".into(), message);
            Ok(render_login(&state, uri.path(), user.as_ref(), &form, &errors)?.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET or POST /auth/logout/
pub async fn logout(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }
    if let Some(user) = user {
        tracing::info!(user_id = user.id, "User logged out");
    }

    let page = state.render("users/logged_out.html", &TeraContext::new(), uri.path(), None)?;
    Ok(([(header::SET_COOKIE, clear_session_cookie())], page).into_response())
}

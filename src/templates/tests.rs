//! Tests for the template engine

use super::*;
use crate::models::{AuthorRef, GroupRef, Page, PageWindow, PostWithMeta, UserRole};
use chrono::Utc;
use std::fs;
use tempfile::TempDir;
use tera::Context as TeraContext;

fn sample_post(id: i64, text: &str) -> PostWithMeta {
    PostWithMeta {
        id,
        text: text.to_string(),
        image: None,
        created_at: Utc::now(),
        author: AuthorRef {
            id: 1,
            username: "leo".to_string(),
        },
        group: Some(GroupRef {
            id: 1,
            slug: "cats".to_string(),
            title: "Cats".to_string(),
        }),
    }
}

fn single_page(items: Vec<PostWithMeta>) -> Page<PostWithMeta> {
    let total = items.len() as u64;
    Page::new(
        items,
        PageWindow {
            number: 1,
            num_pages: 1,
            offset: 0,
            limit: 10,
        },
        total,
    )
}

fn vars() -> PageVars {
    PageVars::new("Yatube", "Posts about everything", "/")
}

#[test]
fn test_embedded_templates_load() {
    let engine = TemplateEngine::embedded().unwrap();

    for name in [
        "base.html",
        "posts/index.html",
        "posts/group_list.html",
        "posts/profile.html",
        "posts/post_detail.html",
        "posts/create_post.html",
        "posts/follow.html",
        "users/login.html",
        "users/signup.html",
        "users/logged_out.html",
        "about/author.html",
        "about/tech.html",
        "core/403.html",
        "core/404.html",
        "core/500.html",
    ] {
        assert!(engine.has_template(name), "missing {}", name);
    }
}

#[test]
fn test_render_index_lists_posts() {
    let engine = TemplateEngine::embedded().unwrap();

    let mut context = TeraContext::new();
    context.insert("page", &single_page(vec![sample_post(1, "first"), sample_post(2, "second")]));

    let html = engine.render_page("posts/index.html", &context, &vars()).unwrap();

    assert_eq!(html.matches("<article class=\"post-card\"").count(), 2);
    assert!(html.contains("first"));
    assert!(html.contains("/group/cats/"));
    assert!(html.contains("Log in"));
}

#[test]
fn test_post_text_is_escaped() {
    let engine = TemplateEngine::embedded().unwrap();

    let mut context = TeraContext::new();
    context.insert("page", &single_page(vec![sample_post(1, "<script>alert(1)</script>\nline two")]));

    let html = engine.render_page("posts/index.html", &context, &vars()).unwrap();

    assert!(!html.contains("<script>alert(1)</script>"));
    assert!(html.contains("&lt;script&gt;"));
    assert!(html.contains("<br>"));
}

#[test]
fn test_header_shows_current_user() {
    let engine = TemplateEngine::embedded().unwrap();
    let mut user = User::new("leo".into(), "leo@example.com".into(), "hash".into(), UserRole::Author);
    user.id = 3;

    let mut context = TeraContext::new();
    context.insert("page", &single_page(vec![]));

    let html = engine
        .render_page("posts/index.html", &context, &vars().with_user(Some(&user)))
        .unwrap();

    assert!(html.contains("/create/"));
    assert!(html.contains("/auth/logout/"));
    assert!(html.contains("No posts yet."));
}

#[test]
fn test_override_directory_replaces_template() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("about")).unwrap();
    fs::write(
        temp_dir.path().join("about/author.html"),
        r#"{% extends "base.html" %}{% block content %}Custom author page{% endblock content %}"#,
    )
    .unwrap();

    let engine = TemplateEngine::new(Some(temp_dir.path())).unwrap();
    let html = engine
        .render_page("about/author.html", &TeraContext::new(), &vars())
        .unwrap();

    assert!(html.contains("Custom author page"));
    assert!(engine.has_template("posts/index.html"));
}

#[test]
fn test_reload_picks_up_new_overrides() {
    let temp_dir = TempDir::new().unwrap();
    let mut engine = TemplateEngine::new(Some(temp_dir.path())).unwrap();
    assert!(!engine.has_template("extra.html"));

    fs::write(temp_dir.path().join("extra.html"), "extra {{ site_name }}").unwrap();
    engine.reload().unwrap();

    let html = engine.render_page("extra.html", &TeraContext::new(), &vars()).unwrap();
    assert_eq!(html, "extra Yatube");
}

#[test]
fn test_missing_override_directory_falls_back() {
    let temp_dir = TempDir::new().unwrap();
    let engine = TemplateEngine::new(Some(&temp_dir.path().join("nope"))).unwrap();

    assert!(engine.has_template("base.html"));
}

#[test]
fn test_render_unknown_template() {
    let engine = TemplateEngine::embedded().unwrap();

    let err = engine.render("nonexistent.html", &TeraContext::new()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TemplateError>(),
        Some(TemplateError::NotFound(_))
    ));

    let fallback = engine.render_with_fallback("nonexistent.html", &TeraContext::new(), &vars());
    assert!(fallback.contains("Template Error"));
    assert!(fallback.contains("nonexistent.html"));

    let ok = engine.render_with_fallback("core/404.html", &TeraContext::new(), &vars());
    assert!(ok.contains("Page not found"));
}

#[test]
fn test_broken_override_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("broken.html"), "{% if %}").unwrap();

    assert!(TemplateEngine::new(Some(temp_dir.path())).is_err());
}

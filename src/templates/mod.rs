//! Template engine
//!
//! Renders pages with Tera. The default templates are embedded in the
//! binary; a configured directory may replace any of them by name
//! (e.g. `posts/index.html`). HTML templates are autoescaped.

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

use crate::models::User;

mod error;

pub use error::TemplateError;

/// Templates compiled into the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct DefaultTemplates;

pub struct TemplateEngine {
    tera: Tera,
    override_path: Option<PathBuf>,
}

impl TemplateEngine {
    /// Load the embedded templates, then any overrides from `override_path`
    pub fn new(override_path: Option<&Path>) -> Result<Self> {
        let override_path = override_path.map(Path::to_path_buf);
        let tera = load_templates(override_path.as_deref())?;
        tracing::debug!(count = tera.get_template_names().count(), "Templates loaded");

        Ok(Self { tera, override_path })
    }

    /// Engine with only the embedded templates
    pub fn embedded() -> Result<Self> {
        Self::new(None)
    }

    /// Re-read templates, picking up edits in the override directory
    pub fn reload(&mut self) -> Result<()> {
        self.tera = load_templates(self.override_path.as_deref())?;
        Ok(())
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        if !self.has_template(template) {
            return Err(TemplateError::NotFound(template.to_string()).into());
        }

        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            TemplateError::RenderError(error_msg).into()
        })
    }

    /// Render a page with the site-wide variables added to `context`
    pub fn render_page(&self, template: &str, context: &TeraContext, vars: &PageVars) -> Result<String> {
        let mut full_context = context.clone();
        full_context.insert("site_name", &vars.site_name);
        full_context.insert("site_description", &vars.site_description);
        full_context.insert("request_path", &vars.request_path);
        full_context.insert("year", &vars.year);
        full_context.insert("current_user", &vars.current_user);

        self.render(template, &full_context)
    }

    /// Render a page; on failure return a bare error page instead
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext, vars: &PageVars) -> String {
        match self.render_page(template, context, vars) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Failed to render template '{}': {}", template, e);
                simple_error_page(template, &e.to_string())
            }
        }
    }
}

fn load_templates(override_path: Option<&Path>) -> Result<Tera> {
    let mut templates: BTreeMap<String, String> = BTreeMap::new();

    for name in DefaultTemplates::iter() {
        if let Some(file) = DefaultTemplates::get(&name) {
            let content = std::str::from_utf8(&file.data)
                .with_context(|| format!("Embedded template {} is not UTF-8", name))?;
            templates.insert(name.replace('\\', "/"), content.to_string());
        }
    }

    if let Some(dir) = override_path {
        if dir.is_dir() {
            let before = templates.len();
            collect_templates_from_dir(dir, dir, &mut templates)?;
            tracing::info!(
                path = %dir.display(),
                added = templates.len() - before,
                "Template overrides loaded"
            );
        } else {
            tracing::warn!(path = %dir.display(), "Template override directory not found, using embedded templates");
        }
    }

    let mut tera = Tera::default();
    tera.add_raw_templates(templates)
        .map_err(|e| TemplateError::RenderError(format!("Failed to load templates: {}", e)))?;
    Ok(tera)
}

/// Collect `.html` files below `current_path`, named relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut BTreeMap<String, String>,
) -> Result<()> {
    for entry in fs::read_dir(current_path).map_err(TemplateError::from)? {
        let path = entry.map_err(TemplateError::from)?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| TemplateError::RenderError("Failed to get relative path".to_string()))?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");

            let content =
                fs::read_to_string(&path).with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.insert(template_name, content);
        }
    }

    Ok(())
}

fn simple_error_page(template: &str, error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Template Error</title>
</head>
<body>
    <h1>Template Error</h1>
    <p>Failed to render template: <code>{}</code></p>
    <pre>{}</pre>
</body>
</html>"#,
        tera::escape_html(template),
        tera::escape_html(error)
    )
}

/// Variables every page template receives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageVars {
    pub site_name: String,
    pub site_description: String,
    pub current_user: Option<Viewer>,
    pub request_path: String,
    pub year: i32,
}

/// The logged-in user as templates see it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewer {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

impl From<&User> for Viewer {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin(),
        }
    }
}

impl PageVars {
    pub fn new(
        site_name: impl Into<String>,
        site_description: impl Into<String>,
        request_path: impl Into<String>,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            site_description: site_description.into(),
            current_user: None,
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
        }
    }

    pub fn with_user(mut self, user: Option<&User>) -> Self {
        self.current_user = user.map(Viewer::from);
        self
    }
}

#[cfg(test)]
mod tests;

//! Template engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    /// No template with that name was loaded
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Parsing or rendering failed
    #[error("Template error: {0}")]
    RenderError(String),

    /// Override directory could not be read
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

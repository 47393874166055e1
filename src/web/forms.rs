//! Form binding and field-level validation
//!
//! Validation failures are collected into [`FieldErrors`] and shown next
//! to the offending field when the form is re-rendered.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header,
    response::{IntoResponse, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::services::{MediaError, MediaStore};

/// Field name to message; `general` holds errors not tied to one field
pub type FieldErrors = BTreeMap<String, String>;

pub const REQUIRED: &str = "This field is required.";

/// `?page=` on listing pages
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

// ============================================================================
// Post form
// ============================================================================

/// An uploaded file, held in memory until the form validates
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Raw post form input
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub text: String,
    /// Group id as submitted; empty means no group
    pub group: String,
    pub image: Option<UploadedImage>,
}

/// Values echoed back into the form template
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostFormValues {
    pub text: String,
    pub group_id: Option<i64>,
}

/// A post form that passed validation
#[derive(Debug, Clone)]
pub struct ValidPostForm {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<UploadedImage>,
}

impl PostForm {
    pub fn values(&self) -> PostFormValues {
        PostFormValues {
            text: self.text.clone(),
            group_id: self.group.trim().parse().ok(),
        }
    }

    /// Check text, group id format and the image upload
    ///
    /// Whether the group exists is left to the post service.
    pub fn validate(self, media: &MediaStore) -> Result<ValidPostForm, FieldErrors> {
        let mut errors = FieldErrors::new();

        let text = self.text.trim().to_string();
        if text.is_empty() {
            errors.insert("text".into(), REQUIRED.into());
        }

        let group = self.group.trim();
        let group_id = if group.is_empty() {
            None
        } else {
            match group.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.insert(
                        "group".into(),
                        "Select a valid choice. That choice is not one of the available choices.".into(),
                    );
                    None
                }
            }
        };

        if let Some(image) = &self.image {
            if let Err(e) = media.validate(&image.data) {
                errors.insert("image".into(), image_error_message(&e));
            }
        }

        if errors.is_empty() {
            Ok(ValidPostForm {
                text,
                group_id,
                image: self.image,
            })
        } else {
            Err(errors)
        }
    }
}

pub fn image_error_message(err: &MediaError) -> String {
    match err {
        MediaError::InvalidType(_) => {
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.".into()
        }
        MediaError::TooLarge { max, .. } => {
            format!("The image is too large. Maximum size is {} MB.", max / 1024 / 1024)
        }
        MediaError::Empty => "The submitted file is empty.".into(),
        MediaError::InternalError(_) => "The image could not be saved.".into(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostFields {
    text: String,
    group: String,
}

/// Post form read from either `multipart/form-data` or an urlencoded body
#[derive(Debug, Clone)]
pub struct PostSubmission(pub PostForm);

impl<S: Send + Sync> FromRequest<S> for PostSubmission {
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(fields) = Form::<PostFields>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(Self(PostForm {
                text: fields.text,
                group: fields.group,
                image: None,
            }));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let mut form = PostForm::default();

        while let Some(field) = multipart.next_field().await.map_err(IntoResponse::into_response)? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "text" => form.text = field.text().await.map_err(IntoResponse::into_response)?,
                "group" => form.group = field.text().await.map_err(IntoResponse::into_response)?,
                "image" => {
                    let file_name = field.file_name().unwrap_or("").to_string();
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let data = field.bytes().await.map_err(IntoResponse::into_response)?;

                    // Browsers send an empty part when no file was chosen
                    if !file_name.is_empty() && !data.is_empty() {
                        form.image = Some(UploadedImage {
                            file_name,
                            content_type,
                            data,
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(Self(form))
    }
}

// ============================================================================
// Comment, signup and login forms
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password1: String,
    #[serde(skip_serializing)]
    pub password2: String,
}

impl SignupForm {
    /// Checks that do not need the database
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.username.trim().is_empty() {
            errors.insert("username".into(), REQUIRED.into());
        }
        if self.email.trim().is_empty() {
            errors.insert("email".into(), REQUIRED.into());
        }
        if self.password1.is_empty() {
            errors.insert("password1".into(), REQUIRED.into());
        }
        if self.password1 != self.password2 {
            errors.insert("password2".into(), "The two password fields didn't match.".into());
        }
        errors
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub next: Option<String>,
}

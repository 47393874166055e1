//! Comment service

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{Comment, CommentWithAuthor, CreateCommentInput, User};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Post not found: {0}")]
    PostNotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    post_repo: Arc<dyn PostRepository>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>, post_repo: Arc<dyn PostRepository>) -> Self {
        Self { repo, post_repo }
    }

    /// Add a comment by `author` to a post
    pub async fn add(&self, author: &User, post_id: i64, text: &str) -> Result<Comment, CommentServiceError> {
        self.ensure_post(post_id).await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(CommentServiceError::ValidationError("This field is required.".to_string()));
        }

        let comment = self
            .repo
            .create(&CreateCommentInput {
                post_id,
                author_id: author.id,
                text: text.to_string(),
            })
            .await
            .context("Failed to create comment")?;

        tracing::info!(comment_id = comment.id, post_id, author_id = author.id, "Comment added");
        Ok(comment)
    }

    /// Comments on a post, oldest first
    pub async fn list(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>, CommentServiceError> {
        let comments = self
            .repo
            .list_by_post(post_id)
            .await
            .context("Failed to list comments")?;
        Ok(comments)
    }

    pub async fn count(&self, post_id: i64) -> Result<u64, CommentServiceError> {
        let count = self
            .repo
            .count_by_post(post_id)
            .await
            .context("Failed to count comments")?;
        Ok(count)
    }

    /// Fails with `PostNotFound` unless the post exists
    pub async fn ensure_post(&self, post_id: i64) -> Result<(), CommentServiceError> {
        self.post_repo
            .get_by_id(post_id)
            .await
            .context("Failed to get post")?
            .map(|_| ())
            .ok_or(CommentServiceError::PostNotFound(post_id))
    }
}

//! Follow service

use crate::db::repositories::{FollowRepository, UserRepository};
use crate::models::User;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum FollowServiceError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// What a follow request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    /// Following yourself is ignored
    SelfFollow,
}

pub struct FollowService {
    repo: Arc<dyn FollowRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl FollowService {
    pub fn new(repo: Arc<dyn FollowRepository>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self { repo, user_repo }
    }

    /// Make `follower` follow the user named `username`
    pub async fn follow(&self, follower: &User, username: &str) -> Result<FollowOutcome, FollowServiceError> {
        let author = self.find_author(username).await?;
        if author.id == follower.id {
            return Ok(FollowOutcome::SelfFollow);
        }

        let created = self
            .repo
            .create(follower.id, author.id)
            .await
            .context("Failed to create follow")?;

        if created {
            tracing::info!(user_id = follower.id, author_id = author.id, "Follow created");
            Ok(FollowOutcome::Created)
        } else {
            Ok(FollowOutcome::AlreadyFollowing)
        }
    }

    /// Returns true if a follow was removed
    pub async fn unfollow(&self, follower: &User, username: &str) -> Result<bool, FollowServiceError> {
        let author = self.find_author(username).await?;
        let removed = self
            .repo
            .delete(follower.id, author.id)
            .await
            .context("Failed to delete follow")?;

        if removed {
            tracing::info!(user_id = follower.id, author_id = author.id, "Follow removed");
        }
        Ok(removed)
    }

    pub async fn is_following(&self, follower_id: i64, author_id: i64) -> Result<bool, FollowServiceError> {
        let exists = self
            .repo
            .exists(follower_id, author_id)
            .await
            .context("Failed to check follow")?;
        Ok(exists)
    }

    async fn find_author(&self, username: &str) -> Result<User, FollowServiceError> {
        self.user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| FollowServiceError::UserNotFound(username.to_string()))
    }
}

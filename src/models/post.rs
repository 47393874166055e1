//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::GroupRef;

/// Post row as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub author_id: i64,
    pub group_id: Option<i64>,
    /// Path relative to the media root, e.g. `posts/<uuid>.gif`
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The part of a user shown next to a post or comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: i64,
    pub username: String,
}

/// Post joined with its author and group, ready for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostWithMeta {
    pub id: i64,
    pub text: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub author: AuthorRef,
    pub group: Option<GroupRef>,
}

/// Which posts a listing shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author this user follows
    FollowedBy(i64),
}

#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub text: String,
    pub author_id: i64,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// New text and group for a post; `image: None` keeps the current image
#[derive(Debug, Clone)]
pub struct UpdatePostInput {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

//! Group model

use serde::{Deserialize, Serialize};

/// A themed community posts may belong to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub title: String,
    /// URL key, `[a-z0-9_-]+`
    pub slug: String,
    pub description: String,
}

/// The part of a group shown next to a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: i64,
    pub slug: String,
    pub title: String,
}

/// Insert a group, or refresh title and description of the one with this slug
#[derive(Debug, Clone)]
pub struct UpsertGroupInput {
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl UpsertGroupInput {
    pub fn new(title: impl Into<String>, slug: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            slug: slug.into(),
            description: description.into(),
        }
    }
}

impl From<&Group> for GroupRef {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id,
            slug: group.slug.clone(),
            title: group.title.clone(),
        }
    }
}

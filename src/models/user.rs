//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered user. Every user may author posts; admins may also delete
/// any post and clear the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Build a user not yet stored; the password must already be hashed
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        Self {
            id: 0,
            username,
            email,
            password_hash,
            role,
            created_at: Utc::now(),
        }
    }

    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Authors may delete their own posts, admins any post
    pub fn can_delete(&self, author_id: i64) -> bool {
        self.is_admin() || self.id == author_id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    Author,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Author => write!(f, "author"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "author" => Ok(UserRole::Author),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_text() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("Author".parse::<UserRole>().unwrap(), UserRole::Author);
        assert!("editor".parse::<UserRole>().is_err());
        assert_eq!(UserRole::Admin.to_string(), "admin");
    }

    #[test]
    fn test_can_delete() {
        let mut user = User::new("leo".into(), "leo@example.com".into(), "hash".into(), UserRole::Author);
        user.id = 3;
        assert!(user.can_delete(3));
        assert!(!user.can_delete(4));

        user.role = UserRole::Admin;
        assert!(user.can_delete(4));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("leo".into(), "leo@example.com".into(), "secret".into(), UserRole::Author);
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"role\":\"author\""));
    }
}

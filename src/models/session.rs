//! Session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login session, identified by the token stored in the `session` cookie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_is_expired() {
        let now = Utc::now();
        let mut session = Session {
            id: "token".to_string(),
            user_id: 1,
            expires_at: now + Duration::days(1),
            created_at: now,
        };
        assert!(!session.is_expired());

        session.expires_at = now - Duration::seconds(1);
        assert!(session.is_expired());
    }
}

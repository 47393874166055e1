//! Follow repository
//!
//! A follow row links a follower (`user_id`) to an author (`author_id`).

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Insert the pair unless it already exists; true if a row was added
    async fn create(&self, user_id: i64, author_id: i64) -> Result<bool>;

    /// Remove the pair; true if a row was removed
    async fn delete(&self, user_id: i64, author_id: i64) -> Result<bool>;

    async fn exists(&self, user_id: i64, author_id: i64) -> Result<bool>;
}

pub struct SqlxFollowRepository {
    pool: DynDatabasePool,
}

impl SqlxFollowRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FollowRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FollowRepository for SqlxFollowRepository {
    async fn create(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("INSERT OR IGNORE INTO follows (user_id, author_id, created_at) VALUES (?, ?, ?)")
                    .bind(user_id)
                    .bind(author_id)
                    .bind(now)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .map(|r| r.rows_affected())
            }
            DatabaseDriver::Mysql => {
                sqlx::query("INSERT IGNORE INTO follows (user_id, author_id, created_at) VALUES (?, ?, ?)")
                    .bind(user_id)
                    .bind(author_id)
                    .bind(now)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .map(|r| r.rows_affected())
            }
        }
        .context("Failed to create follow")?;

        Ok(affected > 0)
    }

    async fn delete(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let sql = "DELETE FROM follows WHERE user_id = ? AND author_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .bind(author_id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .bind(author_id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete follow")?;

        Ok(affected > 0)
    }

    async fn exists(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM follows WHERE user_id = ? AND author_id = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(user_id)
                    .bind(author_id)
                    .fetch_one(self.pool.as_sqlite().unwrap())
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(user_id)
                    .bind(author_id)
                    .fetch_one(self.pool.as_mysql().unwrap())
                    .await
            }
        }
        .context("Failed to check follow")?;

        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (SqlxFollowRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let a = users
            .create(&User::new("a".into(), "a@example.com".into(), "hash".into(), UserRole::Author))
            .await
            .unwrap();
        let b = users
            .create(&User::new("b".into(), "b@example.com".into(), "hash".into(), UserRole::Author))
            .await
            .unwrap();

        (SqlxFollowRepository::new(pool), a.id, b.id)
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let (repo, a, b) = setup().await;

        assert!(repo.create(a, b).await.unwrap());
        assert!(!repo.create(a, b).await.unwrap());
        assert!(repo.exists(a, b).await.unwrap());
        assert!(!repo.exists(b, a).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let (repo, a, b) = setup().await;

        repo.create(a, b).await.unwrap();
        assert!(repo.delete(a, b).await.unwrap());
        assert!(!repo.delete(a, b).await.unwrap());
        assert!(!repo.exists(a, b).await.unwrap());
    }
}

//! Comment repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{AuthorRef, Comment, CommentWithAuthor, CreateCommentInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    /// Comments on a post, oldest first
    async fn list_by_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>>;

    async fn count_by_post(&self, post_id: i64) -> Result<u64>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_SQL: &str = r#"
    SELECT c.id, c.post_id, c.text, c.created_at, u.id AS author_id, u.username AS author_username
    FROM comments c
    JOIN users u ON u.id = c.author_id
    WHERE c.post_id = ?
    ORDER BY c.created_at ASC, c.id ASC
"#;

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        let created_at = Utc::now();
        let sql = "INSERT INTO comments (post_id, author_id, text, created_at) VALUES (?, ?, ?, ?)";

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(input.post_id)
                .bind(input.author_id)
                .bind(&input.text)
                .bind(created_at)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to create comment")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(input.post_id)
                .bind(input.author_id)
                .bind(&input.text)
                .bind(created_at)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to create comment")?
                .last_insert_id() as i64,
        };

        Ok(Comment {
            id,
            post_id: input.post_id,
            author_id: input.author_id,
            text: input.text.clone(),
            created_at,
        })
    }

    async fn list_by_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(LIST_SQL)
                    .bind(post_id)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to list comments")?;
                Ok(rows
                    .iter()
                    .map(|row| CommentWithAuthor {
                        id: row.get("id"),
                        post_id: row.get("post_id"),
                        text: row.get("text"),
                        created_at: row.get("created_at"),
                        author: AuthorRef {
                            id: row.get("author_id"),
                            username: row.get("author_username"),
                        },
                    })
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(LIST_SQL)
                    .bind(post_id)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to list comments")?;
                Ok(rows
                    .iter()
                    .map(|row| CommentWithAuthor {
                        id: row.get("id"),
                        post_id: row.get("post_id"),
                        text: row.get("text"),
                        created_at: row.get("created_at"),
                        author: AuthorRef {
                            id: row.get("author_id"),
                            username: row.get("author_username"),
                        },
                    })
                    .collect())
            }
        }
    }

    async fn count_by_post(&self, post_id: i64) -> Result<u64> {
        let sql = "SELECT COUNT(*) FROM comments WHERE post_id = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(post_id)
                    .fetch_one(self.pool.as_sqlite().unwrap())
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(post_id)
                    .fetch_one(self.pool.as_mysql().unwrap())
                    .await
            }
        }
        .context("Failed to count comments")?;

        Ok(count.max(0) as u64)
    }
}

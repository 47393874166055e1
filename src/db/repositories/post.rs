//! Post repository
//!
//! Listings join each post with its author and group and are ordered
//! newest first (`created_at DESC, id DESC`).

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{AuthorRef, CreatePostInput, GroupRef, Post, PostFilter, PostWithMeta, UpdatePostInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, input: &CreatePostInput) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Get a post joined with its author and group
    async fn get_with_meta(&self, id: i64) -> Result<Option<PostWithMeta>>;

    /// Replace text and group; the image changes only when a new one is given
    async fn update(&self, id: i64, input: &UpdatePostInput) -> Result<()>;

    /// Delete a post; its comments go with it
    async fn delete(&self, id: i64) -> Result<()>;

    async fn count(&self, filter: PostFilter) -> Result<u64>;

    async fn list(&self, filter: PostFilter, offset: u64, limit: u32) -> Result<Vec<PostWithMeta>>;
}

pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

const POST_COLUMNS: &str = "id, text, author_id, group_id, image, created_at";

const META_SELECT: &str = r#"
    SELECT p.id, p.text, p.image, p.created_at,
           u.id AS author_id, u.username AS author_username,
           g.id AS group_id, g.slug AS group_slug, g.title AS group_title
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

/// WHERE clause and its single bind value for a listing filter
fn filter_clause(filter: PostFilter) -> (&'static str, Option<i64>) {
    match filter {
        PostFilter::All => ("", None),
        PostFilter::Group(id) => ("WHERE p.group_id = ?", Some(id)),
        PostFilter::Author(id) => ("WHERE p.author_id = ?", Some(id)),
        PostFilter::FollowedBy(user_id) => (
            "WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ?)",
            Some(user_id),
        ),
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, input: &CreatePostInput) -> Result<Post> {
        let created_at = Utc::now();
        let sql = "INSERT INTO posts (text, author_id, group_id, image, created_at) VALUES (?, ?, ?, ?, ?)";

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&input.text)
                .bind(input.author_id)
                .bind(input.group_id)
                .bind(&input.image)
                .bind(created_at)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to create post")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&input.text)
                .bind(input.author_id)
                .bind(input.group_id)
                .bind(&input.image)
                .bind(created_at)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to create post")?
                .last_insert_id() as i64,
        };

        Ok(Post {
            id,
            text: input.text.clone(),
            author_id: input.author_id,
            group_id: input.group_id,
            image: input.image.clone(),
            created_at,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get post by ID")?;
                Ok(row.as_ref().map(row_to_post_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get post by ID")?;
                Ok(row.as_ref().map(row_to_post_mysql))
            }
        }
    }

    async fn get_with_meta(&self, id: i64) -> Result<Option<PostWithMeta>> {
        let sql = format!("{} WHERE p.id = ?", META_SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get post")?;
                Ok(row.as_ref().map(row_to_meta_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get post")?;
                Ok(row.as_ref().map(row_to_meta_mysql))
            }
        }
    }

    async fn update(&self, id: i64, input: &UpdatePostInput) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_post_sqlite(self.pool.as_sqlite().unwrap(), id, input).await,
            DatabaseDriver::Mysql => update_post_mysql(self.pool.as_mysql().unwrap(), id, input).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .map(|_| ()),
        };
        result.context("Failed to delete post")
    }

    async fn count(&self, filter: PostFilter) -> Result<u64> {
        let (clause, value) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM posts p {}", clause);

        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query_scalar::<_, i64>(&sql);
                if let Some(value) = value {
                    query = query.bind(value);
                }
                query.fetch_one(self.pool.as_sqlite().unwrap()).await
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query_scalar::<_, i64>(&sql);
                if let Some(value) = value {
                    query = query.bind(value);
                }
                query.fetch_one(self.pool.as_mysql().unwrap()).await
            }
        }
        .context("Failed to count posts")?;

        Ok(count.max(0) as u64)
    }

    async fn list(&self, filter: PostFilter, offset: u64, limit: u32) -> Result<Vec<PostWithMeta>> {
        let (clause, value) = filter_clause(filter);
        let sql = format!(
            "{} {} ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
            META_SELECT, clause
        );

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&sql);
                if let Some(value) = value {
                    query = query.bind(value);
                }
                let rows = query
                    .bind(limit as i64)
                    .bind(offset as i64)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to list posts")?;
                Ok(rows.iter().map(row_to_meta_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                if let Some(value) = value {
                    query = query.bind(value);
                }
                let rows = query
                    .bind(limit as i64)
                    .bind(offset as i64)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to list posts")?;
                Ok(rows.iter().map(row_to_meta_mysql).collect())
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn update_post_sqlite(pool: &SqlitePool, id: i64, input: &UpdatePostInput) -> Result<()> {
    sqlx::query("UPDATE posts SET text = ?, group_id = ?, image = COALESCE(?, image) WHERE id = ?")
        .bind(&input.text)
        .bind(input.group_id)
        .bind(&input.image)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update post")?;

    Ok(())
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        text: row.get("text"),
        author_id: row.get("author_id"),
        group_id: row.get("group_id"),
        image: row.get("image"),
        created_at: row.get("created_at"),
    }
}

fn row_to_meta_sqlite(row: &sqlx::sqlite::SqliteRow) -> PostWithMeta {
    let group_id: Option<i64> = row.get("group_id");
    PostWithMeta {
        id: row.get("id"),
        text: row.get("text"),
        image: row.get("image"),
        created_at: row.get("created_at"),
        author: AuthorRef {
            id: row.get("author_id"),
            username: row.get("author_username"),
        },
        group: group_id.map(|id| GroupRef {
            id,
            slug: row.get("group_slug"),
            title: row.get("group_title"),
        }),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn update_post_mysql(pool: &MySqlPool, id: i64, input: &UpdatePostInput) -> Result<()> {
    sqlx::query("UPDATE posts SET text = ?, group_id = ?, image = COALESCE(?, image) WHERE id = ?")
        .bind(&input.text)
        .bind(input.group_id)
        .bind(&input.image)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update post")?;

    Ok(())
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Post {
    Post {
        id: row.get("id"),
        text: row.get("text"),
        author_id: row.get("author_id"),
        group_id: row.get("group_id"),
        image: row.get("image"),
        created_at: row.get("created_at"),
    }
}

fn row_to_meta_mysql(row: &sqlx::mysql::MySqlRow) -> PostWithMeta {
    let group_id: Option<i64> = row.get("group_id");
    PostWithMeta {
        id: row.get("id"),
        text: row.get("text"),
        image: row.get("image"),
        created_at: row.get("created_at"),
        author: AuthorRef {
            id: row.get("author_id"),
            username: row.get("author_username"),
        },
        group: group_id.map(|id| GroupRef {
            id,
            slug: row.get("group_slug"),
            title: row.get("group_title"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{GroupRepository, SqlxGroupRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{UpsertGroupInput, User, UserRole};

    struct Fixture {
        repo: SqlxPostRepository,
        pool: DynDatabasePool,
        author: i64,
        group: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");

        let author = SqlxUserRepository::new(pool.clone())
            .create(&User::new("leo".into(), "leo@example.com".into(), "hash".into(), UserRole::Author))
            .await
            .unwrap()
            .id;
        let group = SqlxGroupRepository::new(pool.clone())
            .upsert(&UpsertGroupInput::new("Cats", "cats", ""))
            .await
            .unwrap()
            .id;

        Fixture {
            repo: SqlxPostRepository::new(pool.clone()),
            pool,
            author,
            group,
        }
    }

    fn input(text: &str, author_id: i64, group_id: Option<i64>) -> CreatePostInput {
        CreatePostInput {
            text: text.to_string(),
            author_id,
            group_id,
            image: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_with_meta() {
        let f = setup().await;

        let post = f.repo.create(&input("hello", f.author, Some(f.group))).await.unwrap();
        let meta = f.repo.get_with_meta(post.id).await.unwrap().expect("Post not found");

        assert_eq!(meta.text, "hello");
        assert_eq!(meta.author.username, "leo");
        assert_eq!(meta.group.map(|g| g.slug), Some("cats".to_string()));
        assert!(f.repo.get_with_meta(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first_with_window() {
        let f = setup().await;
        for i in 0..13 {
            f.repo.create(&input(&format!("post {}", i), f.author, None)).await.unwrap();
        }

        let first = f.repo.list(PostFilter::All, 0, 10).await.unwrap();
        let second = f.repo.list(PostFilter::All, 10, 10).await.unwrap();

        assert_eq!(first.len(), 10);
        assert_eq!(second.len(), 3);
        assert_eq!(first[0].text, "post 12");
        assert_eq!(second[2].text, "post 0");
    }

    #[tokio::test]
    async fn test_filters() {
        let f = setup().await;
        let other = SqlxUserRepository::new(f.pool.clone())
            .create(&User::new("mia".into(), "mia@example.com".into(), "hash".into(), UserRole::Author))
            .await
            .unwrap()
            .id;

        f.repo.create(&input("grouped", f.author, Some(f.group))).await.unwrap();
        f.repo.create(&input("loose", f.author, None)).await.unwrap();
        f.repo.create(&input("by mia", other, None)).await.unwrap();

        assert_eq!(f.repo.count(PostFilter::All).await.unwrap(), 3);
        assert_eq!(f.repo.count(PostFilter::Group(f.group)).await.unwrap(), 1);
        assert_eq!(f.repo.count(PostFilter::Author(f.author)).await.unwrap(), 2);
        assert_eq!(f.repo.count(PostFilter::FollowedBy(f.author)).await.unwrap(), 0);

        sqlx::query("INSERT INTO follows (user_id, author_id, created_at) VALUES (?, ?, ?)")
            .bind(f.author)
            .bind(other)
            .bind(Utc::now())
            .execute(f.pool.as_sqlite().unwrap())
            .await
            .unwrap();

        let followed = f.repo.list(PostFilter::FollowedBy(f.author), 0, 10).await.unwrap();
        assert_eq!(followed.len(), 1);
        assert_eq!(followed[0].text, "by mia");
    }

    #[tokio::test]
    async fn test_update_keeps_image_unless_replaced() {
        let f = setup().await;
        let mut create = input("v1", f.author, None);
        create.image = Some("posts/a.gif".to_string());
        let post = f.repo.create(&create).await.unwrap();

        f.repo
            .update(post.id, &UpdatePostInput { text: "v2".into(), group_id: Some(f.group), image: None })
            .await
            .unwrap();
        let stored = f.repo.get_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(stored.text, "v2");
        assert_eq!(stored.group_id, Some(f.group));
        assert_eq!(stored.image.as_deref(), Some("posts/a.gif"));

        f.repo
            .update(post.id, &UpdatePostInput { text: "v3".into(), group_id: None, image: Some("posts/b.png".into()) })
            .await
            .unwrap();
        let stored = f.repo.get_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(stored.group_id, None);
        assert_eq!(stored.image.as_deref(), Some("posts/b.png"));
    }

    #[tokio::test]
    async fn test_delete() {
        let f = setup().await;
        let post = f.repo.create(&input("bye", f.author, None)).await.unwrap();

        f.repo.delete(post.id).await.unwrap();
        assert!(f.repo.get_by_id(post.id).await.unwrap().is_none());
    }
}

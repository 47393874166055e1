//! Group repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Group, UpsertGroupInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Insert the group, or update title/description of the one with the same slug
    async fn upsert(&self, input: &UpsertGroupInput) -> Result<Group>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Group>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>>;

    /// All groups ordered by title
    async fn list(&self) -> Result<Vec<Group>>;
}

pub struct SqlxGroupRepository {
    pool: DynDatabasePool,
}

impl SqlxGroupRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn GroupRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl GroupRepository for SqlxGroupRepository {
    async fn upsert(&self, input: &UpsertGroupInput) -> Result<Group> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => upsert_group_sqlite(self.pool.as_sqlite().unwrap(), input).await?,
            DatabaseDriver::Mysql => upsert_group_mysql(self.pool.as_mysql().unwrap(), input).await?,
        }

        self.get_by_slug(&input.slug)
            .await?
            .with_context(|| format!("Group '{}' missing after upsert", input.slug))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Group>> {
        let sql = "SELECT id, title, slug, description FROM post_groups WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get group by ID")?;
                Ok(row.as_ref().map(row_to_group_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get group by ID")?;
                Ok(row.as_ref().map(row_to_group_mysql))
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let sql = "SELECT id, title, slug, description FROM post_groups WHERE slug = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(sql)
                    .bind(slug)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get group by slug")?;
                Ok(row.as_ref().map(row_to_group_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(sql)
                    .bind(slug)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get group by slug")?;
                Ok(row.as_ref().map(row_to_group_mysql))
            }
        }
    }

    async fn list(&self) -> Result<Vec<Group>> {
        let sql = "SELECT id, title, slug, description FROM post_groups ORDER BY title, id";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(sql)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to list groups")?;
                Ok(rows.iter().map(row_to_group_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(sql)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to list groups")?;
                Ok(rows.iter().map(row_to_group_mysql).collect())
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn upsert_group_sqlite(pool: &SqlitePool, input: &UpsertGroupInput) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO post_groups (title, slug, description)
        VALUES (?, ?, ?)
        ON CONFLICT(slug) DO UPDATE SET title = excluded.title, description = excluded.description
        "#,
    )
    .bind(&input.title)
    .bind(&input.slug)
    .bind(&input.description)
    .execute(pool)
    .await
    .context("Failed to upsert group")?;

    Ok(())
}

fn row_to_group_sqlite(row: &sqlx::sqlite::SqliteRow) -> Group {
    Group {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn upsert_group_mysql(pool: &MySqlPool, input: &UpsertGroupInput) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO post_groups (title, slug, description)
        VALUES (?, ?, ?)
        ON DUPLICATE KEY UPDATE title = VALUES(title), description = VALUES(description)
        "#,
    )
    .bind(&input.title)
    .bind(&input.slug)
    .bind(&input.description)
    .execute(pool)
    .await
    .context("Failed to upsert group")?;

    Ok(())
}

fn row_to_group_mysql(row: &sqlx::mysql::MySqlRow) -> Group {
    Group {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
    }
}

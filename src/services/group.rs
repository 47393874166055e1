//! Group service

use crate::config::GroupSeed;
use crate::db::repositories::GroupRepository;
use crate::models::{Group, UpsertGroupInput};
use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_-]+$").unwrap());

/// Check that a slug is usable in `/group/<slug>/`
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

pub struct GroupService {
    repo: Arc<dyn GroupRepository>,
}

impl GroupService {
    pub fn new(repo: Arc<dyn GroupRepository>) -> Self {
        Self { repo }
    }

    /// Upsert the configured groups by slug, returning how many were written
    pub async fn seed(&self, seeds: &[GroupSeed]) -> Result<usize> {
        for seed in seeds {
            if !is_valid_slug(&seed.slug) {
                bail!("Invalid group slug '{}': use lowercase letters, digits, '-' or '_'", seed.slug);
            }
        }

        for seed in seeds {
            let input = UpsertGroupInput::new(&seed.title, &seed.slug, &seed.description);
            let group = self
                .repo
                .upsert(&input)
                .await
                .with_context(|| format!("Failed to seed group '{}'", seed.slug))?;
            tracing::debug!(group_id = group.id, slug = %group.slug, "Group seeded");
        }

        Ok(seeds.len())
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        self.repo.get_by_slug(slug).await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Group>> {
        self.repo.get_by_id(id).await
    }

    pub async fn list(&self) -> Result<Vec<Group>> {
        self.repo.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxGroupRepository;
    use crate::db::{create_test_pool, migrations};

    async fn create_test_service() -> GroupService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        GroupService::new(SqlxGroupRepository::boxed(pool))
    }

    fn seed(title: &str, slug: &str) -> GroupSeed {
        GroupSeed {
            title: title.to_string(),
            slug: slug.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("cats"));
        assert!(is_valid_slug("cats_and-dogs2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("Cats"));
        assert!(!is_valid_slug("cats/dogs"));
    }

    #[tokio::test]
    async fn test_seed_is_repeatable() {
        let service = create_test_service().await;
        let seeds = vec![seed("Cats", "cats"), seed("Dogs", "dogs")];

        assert_eq!(service.seed(&seeds).await.unwrap(), 2);
        assert_eq!(service.seed(&seeds).await.unwrap(), 2);
        assert_eq!(service.list().await.unwrap().len(), 2);

        let renamed = vec![seed("Big cats", "cats")];
        service.seed(&renamed).await.unwrap();
        let cats = service.get_by_slug("cats").await.unwrap().unwrap();
        assert_eq!(cats.title, "Big cats");
        assert_eq!(service.get_by_id(cats.id).await.unwrap(), Some(cats));
    }

    #[tokio::test]
    async fn test_seed_rejects_bad_slug_before_writing() {
        let service = create_test_service().await;
        let seeds = vec![seed("Cats", "cats"), seed("Bad", "Not Valid")];

        assert!(service.seed(&seeds).await.is_err());
        assert!(service.list().await.unwrap().is_empty());
    }
}

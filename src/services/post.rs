//! Post service
//!
//! Listings (index, group, profile, follow feed), post detail, and the
//! create/edit/delete rules. The index page is cached as rendered HTML,
//! keyed by viewer and page number. Mutations do not touch that cache;
//! entries leave it by expiry or an explicit clear.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{GroupRepository, PostRepository, UserRepository};
use crate::models::{
    CreatePostInput, Group, Page, Paginator, Post, PostFilter, PostWithMeta, UpdatePostInput, User,
};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

/// Default index cache lifetime
pub const INDEX_CACHE_TTL_SECS: u64 = 20;

/// Cache key prefix for rendered index pages
const CACHE_KEY_INDEX: &str = "index:";

#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found: {0}")]
    NotFound(String),

    /// A referenced group, user or slug does not exist
    #[error("Not found: {0}")]
    RelatedNotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// `field` names the offending form field
    #[error("Validation error on {field}: {message}")]
    ValidationError { field: &'static str, message: String },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Submitted post content, shared by create and edit
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    pub group_id: Option<i64>,
    /// Stored image path; `None` on edit keeps the current image
    pub image: Option<String>,
}

pub struct PostService {
    post_repo: Arc<dyn PostRepository>,
    group_repo: Arc<dyn GroupRepository>,
    user_repo: Arc<dyn UserRepository>,
    cache: Arc<Cache>,
    per_page: u32,
    index_ttl: Duration,
}

impl PostService {
    pub fn new(
        post_repo: Arc<dyn PostRepository>,
        group_repo: Arc<dyn GroupRepository>,
        user_repo: Arc<dyn UserRepository>,
        cache: Arc<Cache>,
        per_page: u32,
    ) -> Self {
        Self::with_index_ttl(
            post_repo,
            group_repo,
            user_repo,
            cache,
            per_page,
            Duration::from_secs(INDEX_CACHE_TTL_SECS),
        )
    }

    pub fn with_index_ttl(
        post_repo: Arc<dyn PostRepository>,
        group_repo: Arc<dyn GroupRepository>,
        user_repo: Arc<dyn UserRepository>,
        cache: Arc<Cache>,
        per_page: u32,
        index_ttl: Duration,
    ) -> Self {
        Self {
            post_repo,
            group_repo,
            user_repo,
            cache,
            per_page: per_page.max(1),
            index_ttl,
        }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Cache key of one rendered index page
    pub fn index_cache_key(viewer: Option<i64>, page: u32) -> String {
        match viewer {
            Some(id) => format!("{}user-{}:{}", CACHE_KEY_INDEX, id, page),
            None => format!("{}anon:{}", CACHE_KEY_INDEX, page),
        }
    }

    /// Drop every cached index page, for all viewers
    pub async fn clear_index_cache(&self) -> Result<(), PostServiceError> {
        self.cache
            .delete_pattern(&format!("{}*", CACHE_KEY_INDEX))
            .await
            .context("Failed to clear index cache")?;
        Ok(())
    }

    /// Render an index page, serving it from cache when present
    ///
    /// `render` turns the page of posts into HTML; it runs only on a miss.
    pub async fn render_index<F>(
        &self,
        viewer: Option<i64>,
        requested: Option<&str>,
        render: F,
    ) -> Result<String, PostServiceError>
    where
        F: FnOnce(Page<PostWithMeta>) -> anyhow::Result<String>,
    {
        let total = self
            .post_repo
            .count(PostFilter::All)
            .await
            .context("Failed to count posts")?;
        let window = Paginator::new(total, self.per_page).page(requested);

        let cache_key = Self::index_cache_key(viewer, window.number);
        if let Some(html) = self.cache.get::<String>(&cache_key).await.ok().flatten() {
            tracing::debug!(key = %cache_key, "Index cache hit");
            return Ok(html);
        }

        let items = self
            .post_repo
            .list(PostFilter::All, window.offset, window.limit)
            .await
            .context("Failed to list posts")?;
        let html = render(Page::new(items, window, total))?;

        let _ = self.cache.set(&cache_key, &html, self.index_ttl).await;
        Ok(html)
    }

    /// One page of posts matching a filter, newest first
    pub async fn list_page(
        &self,
        filter: PostFilter,
        requested: Option<&str>,
    ) -> Result<Page<PostWithMeta>, PostServiceError> {
        let total = self.post_repo.count(filter).await.context("Failed to count posts")?;
        let window = Paginator::new(total, self.per_page).page(requested);
        let items = self
            .post_repo
            .list(filter, window.offset, window.limit)
            .await
            .context("Failed to list posts")?;

        Ok(Page::new(items, window, total))
    }

    pub async fn group_page(
        &self,
        slug: &str,
        requested: Option<&str>,
    ) -> Result<(Group, Page<PostWithMeta>), PostServiceError> {
        let group = self
            .group_repo
            .get_by_slug(slug)
            .await
            .context("Failed to get group")?
            .ok_or_else(|| PostServiceError::RelatedNotFound(format!("group '{}'", slug)))?;

        let page = self.list_page(PostFilter::Group(group.id), requested).await?;
        Ok((group, page))
    }

    /// The author and one page of their posts; `page.total` is their post count
    pub async fn profile(
        &self,
        username: &str,
        requested: Option<&str>,
    ) -> Result<(User, Page<PostWithMeta>), PostServiceError> {
        let author = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| PostServiceError::RelatedNotFound(format!("user '{}'", username)))?;

        let page = self.list_page(PostFilter::Author(author.id), requested).await?;
        Ok((author, page))
    }

    /// Posts by the authors `user` follows
    pub async fn follow_feed(
        &self,
        user: &User,
        requested: Option<&str>,
    ) -> Result<Page<PostWithMeta>, PostServiceError> {
        self.list_page(PostFilter::FollowedBy(user.id), requested).await
    }

    pub async fn get(&self, id: i64) -> Result<PostWithMeta, PostServiceError> {
        self.post_repo
            .get_with_meta(id)
            .await
            .context("Failed to get post")?
            .ok_or_else(|| PostServiceError::NotFound(id.to_string()))
    }

    /// Fetch a post for editing; only its author may edit
    pub async fn get_for_edit(&self, editor: &User, id: i64) -> Result<Post, PostServiceError> {
        let post = self.get_raw(id).await?;
        if post.author_id != editor.id {
            return Err(PostServiceError::Forbidden(format!(
                "user {} may not edit post {}",
                editor.id, id
            )));
        }
        Ok(post)
    }

    pub async fn create(&self, author: &User, draft: PostDraft) -> Result<Post, PostServiceError> {
        let text = self.validate_draft(&draft).await?;

        let input = CreatePostInput {
            text,
            author_id: author.id,
            group_id: draft.group_id,
            image: draft.image,
        };
        let post = self.post_repo.create(&input).await.context("Failed to create post")?;

        tracing::info!(post_id = post.id, author_id = author.id, "Post created");
        Ok(post)
    }

    pub async fn update(&self, editor: &User, id: i64, draft: PostDraft) -> Result<Post, PostServiceError> {
        let existing = self.get_for_edit(editor, id).await?;
        let text = self.validate_draft(&draft).await?;

        let input = UpdatePostInput {
            text,
            group_id: draft.group_id,
            image: draft.image,
        };
        self.post_repo
            .update(existing.id, &input)
            .await
            .context("Failed to update post")?;

        tracing::info!(post_id = id, "Post updated");
        self.get_raw(id).await
    }

    /// Delete a post as its author or an admin, returning the removed row
    pub async fn delete(&self, actor: &User, id: i64) -> Result<Post, PostServiceError> {
        let post = self.get_raw(id).await?;
        if !actor.can_delete(post.author_id) {
            return Err(PostServiceError::Forbidden(format!(
                "user {} may not delete post {}",
                actor.id, id
            )));
        }

        self.post_repo.delete(id).await.context("Failed to delete post")?;
        tracing::info!(post_id = id, actor_id = actor.id, "Post deleted");
        Ok(post)
    }

    async fn get_raw(&self, id: i64) -> Result<Post, PostServiceError> {
        self.post_repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or_else(|| PostServiceError::NotFound(id.to_string()))
    }

    /// Returns the trimmed text
    async fn validate_draft(&self, draft: &PostDraft) -> Result<String, PostServiceError> {
        let text = draft.text.trim();
        if text.is_empty() {
            return Err(PostServiceError::ValidationError {
                field: "text",
                message: "This field is required.".to_string(),
            });
        }

        if let Some(group_id) = draft.group_id {
            let exists = self
                .group_repo
                .get_by_id(group_id)
                .await
                .context("Failed to get group")?
                .is_some();
            if !exists {
                return Err(PostServiceError::ValidationError {
                    field: "group",
                    message: "Select a valid choice. That choice is not one of the available choices."
                        .to_string(),
                });
            }
        }

        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        FollowRepository, SqlxFollowRepository, SqlxGroupRepository, SqlxPostRepository,
        SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{UpsertGroupInput, UserRole};

    struct Fixture {
        pool: DynDatabasePool,
        cache: Arc<Cache>,
        service: PostService,
        author: User,
        other: User,
        group: Group,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");

        let users = SqlxUserRepository::boxed(pool.clone());
        let author = users
            .create(&User::new("leo".into(), "leo@example.com".into(), "hash".into(), UserRole::Author))
            .await
            .unwrap();
        let other = users
            .create(&User::new("tom".into(), "tom@example.com".into(), "hash".into(), UserRole::Author))
            .await
            .unwrap();
        let groups = SqlxGroupRepository::boxed(pool.clone());
        let group = groups
            .upsert(&UpsertGroupInput::new("Cats", "cats", "Meow"))
            .await
            .unwrap();

        let cache = Arc::new(Cache::Memory(MemoryCache::new()));
        let service = PostService::new(
            SqlxPostRepository::boxed(pool.clone()),
            groups,
            users,
            cache.clone(),
            10,
        );

        Fixture {
            pool,
            cache,
            service,
            author,
            other,
            group,
        }
    }

    fn draft(text: &str) -> PostDraft {
        PostDraft {
            text: text.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let f = setup().await;

        let post = f
            .service
            .create(
                &f.author,
                PostDraft {
                    text: "  hello  ".into(),
                    group_id: Some(f.group.id),
                    image: Some("posts/a.gif".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(post.text, "hello");

        let meta = f.service.get(post.id).await.unwrap();
        assert_eq!(meta.author.username, "leo");
        assert_eq!(meta.group.unwrap().slug, "cats");
        assert_eq!(meta.image.as_deref(), Some("posts/a.gif"));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let f = setup().await;

        let err = f.service.create(&f.author, draft("   ")).await.unwrap_err();
        assert!(matches!(err, PostServiceError::ValidationError { field: "text", .. }));

        let bad_group = PostDraft {
            text: "hi".into(),
            group_id: Some(9999),
            image: None,
        };
        let err = f.service.create(&f.author, bad_group).await.unwrap_err();
        assert!(matches!(err, PostServiceError::ValidationError { field: "group", .. }));

        assert_eq!(f.service.list_page(PostFilter::All, None).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_only_author_edits() {
        let f = setup().await;
        let post = f.service.create(&f.author, draft("original")).await.unwrap();

        let err = f
            .service
            .update(&f.other, post.id, draft("hijacked"))
            .await
            .unwrap_err();
        assert!(matches!(err, PostServiceError::Forbidden(_)));
        assert_eq!(f.service.get(post.id).await.unwrap().text, "original");

        let updated = f
            .service
            .update(
                &f.author,
                post.id,
                PostDraft {
                    text: "edited".into(),
                    group_id: Some(f.group.id),
                    image: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.text, "edited");
        assert_eq!(updated.group_id, Some(f.group.id));

        let err = f.service.update(&f.author, 9999, draft("x")).await.unwrap_err();
        assert!(matches!(err, PostServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_by_author_or_admin() {
        let f = setup().await;
        let post = f.service.create(&f.author, draft("mine")).await.unwrap();

        let err = f.service.delete(&f.other, post.id).await.unwrap_err();
        assert!(matches!(err, PostServiceError::Forbidden(_)));

        let mut admin = f.other.clone();
        admin.role = UserRole::Admin;
        let deleted = f.service.delete(&admin, post.id).await.unwrap();
        assert_eq!(deleted.id, post.id);
        assert!(matches!(f.service.get(post.id).await, Err(PostServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_listing_pages() {
        let f = setup().await;
        for i in 0..13 {
            f.service.create(&f.author, draft(&format!("post {}", i))).await.unwrap();
        }

        let first = f.service.list_page(PostFilter::All, None).await.unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.items[0].text, "post 12");
        assert!(first.has_next);

        let second = f.service.list_page(PostFilter::All, Some("2")).await.unwrap();
        assert_eq!(second.items.len(), 3);
        assert_eq!(second.number, 2);

        let clamped = f.service.list_page(PostFilter::All, Some("99")).await.unwrap();
        assert_eq!(clamped.number, 2);
    }

    #[tokio::test]
    async fn test_group_and_profile_pages() {
        let f = setup().await;
        f.service
            .create(
                &f.author,
                PostDraft {
                    text: "grouped".into(),
                    group_id: Some(f.group.id),
                    image: None,
                },
            )
            .await
            .unwrap();
        f.service.create(&f.other, draft("loose")).await.unwrap();

        let (group, page) = f.service.group_page("cats", None).await.unwrap();
        assert_eq!(group.id, f.group.id);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].text, "grouped");

        let (author, page) = f.service.profile("tom", None).await.unwrap();
        assert_eq!(author.id, f.other.id);
        assert_eq!(page.total, 1);

        assert!(matches!(
            f.service.group_page("dogs", None).await,
            Err(PostServiceError::RelatedNotFound(_))
        ));
        assert!(matches!(
            f.service.profile("ghost", None).await,
            Err(PostServiceError::RelatedNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_follow_feed() {
        let f = setup().await;
        f.service.create(&f.author, draft("by leo")).await.unwrap();

        assert!(f.service.follow_feed(&f.other, None).await.unwrap().is_empty());

        SqlxFollowRepository::new(f.pool.clone())
            .create(f.other.id, f.author.id)
            .await
            .unwrap();
        let feed = f.service.follow_feed(&f.other, None).await.unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].author.id, f.author.id);
    }

    #[tokio::test]
    async fn test_index_is_cached_until_cleared() {
        let f = setup().await;
        let post = f.service.create(&f.author, draft("first")).await.unwrap();

        let render = |page: Page<PostWithMeta>| -> anyhow::Result<String> {
            Ok(page.items.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join(","))
        };

        let html = f.service.render_index(None, None, render).await.unwrap();
        assert_eq!(html, "first");

        f.service.delete(&f.author, post.id).await.unwrap();
        let cached = f
            .service
            .render_index(None, None, |_| -> anyhow::Result<String> { panic!("cache miss") })
            .await
            .unwrap();
        assert_eq!(cached, "first");

        f.cache.set("groups:all", &"kept".to_string(), Duration::from_secs(60)).await.unwrap();
        f.service.clear_index_cache().await.unwrap();
        let other: Option<String> = f.cache.get("groups:all").await.unwrap();
        assert_eq!(other.as_deref(), Some("kept"));
        let fresh = f.service.render_index(None, None, render).await.unwrap();
        assert_eq!(fresh, "");
    }

    #[tokio::test]
    async fn test_index_cache_is_per_viewer() {
        let f = setup().await;
        f.service.create(&f.author, draft("first")).await.unwrap();

        f.service
            .render_index(None, None, |_| Ok("anon".to_string()))
            .await
            .unwrap();
        let html = f
            .service
            .render_index(Some(f.author.id), None, |_| Ok("leo".to_string()))
            .await
            .unwrap();
        assert_eq!(html, "leo");
        assert_eq!(PostService::index_cache_key(None, 2), "index:anon:2");
        assert_eq!(PostService::index_cache_key(Some(7), 1), "index:user-7:1");
    }
}

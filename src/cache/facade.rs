//! Typed cache layer for blog entities.
//!
//! One [`CacheStore`] holds every kind; payloads are tagged with
//! [`CachedValue`] so a slot written as a user can only be read back as a
//! user.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::config::CacheConfig;
use super::keys::{CacheKey, EntityKind, KeyParams, make_key};
use super::store::{CacheStats, CacheStore};
use crate::domain::entities::{AuthorView, BlogPost, User};

/// Payload stored in the shared cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    User(User),
    Document(BlogPost),
    Listing(ListingPage),
    Author(AuthorView),
}

/// A cached page of posts and the store marker that resumes after it.
///
/// `next_marker` is the marker the document store reported for the page's
/// last document, kept verbatim so a page served from the cache resumes
/// exactly where the store would.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListingPage {
    pub posts: Vec<BlogPost>,
    pub next_marker: Option<String>,
}

/// Entity-aware facade over a shared [`CacheStore`].
#[derive(Clone)]
pub struct DomainCache {
    store: Arc<CacheStore<CachedValue>>,
    config: CacheConfig,
}

impl DomainCache {
    pub fn new(store: Arc<CacheStore<CachedValue>>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// Build a fresh store sized from `config`.
    pub fn from_config(config: CacheConfig) -> Self {
        let store = Arc::new(CacheStore::from_config(&config));
        Self::new(store, config)
    }

    pub fn store(&self) -> &Arc<CacheStore<CachedValue>> {
        &self.store
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn get_user(&self, id: &str) -> Option<User> {
        match self.store.get(&user_key(id))? {
            CachedValue::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn put_user(&self, id: &str, user: User) {
        self.store.put(
            user_key(id),
            CachedValue::User(user),
            self.config.ttl_for(EntityKind::User),
        );
    }

    /// Listing for `scope` (e.g. `"blogs"`) and `id` (e.g. `"all"`).
    pub fn get_listing(&self, scope: &str, id: &str, params: &KeyParams) -> Option<Vec<BlogPost>> {
        self.get_listing_page(scope, id, params)
            .map(|page| page.posts)
    }

    pub fn put_listing(&self, scope: &str, id: &str, params: &KeyParams, posts: Vec<BlogPost>) {
        self.put_listing_page(
            scope,
            id,
            params,
            ListingPage {
                posts,
                next_marker: None,
            },
        );
    }

    pub fn get_listing_page(&self, scope: &str, id: &str, params: &KeyParams) -> Option<ListingPage> {
        match self.store.get(&listing_key(scope, id, params))? {
            CachedValue::Listing(page) => Some(page),
            _ => None,
        }
    }

    pub fn put_listing_page(&self, scope: &str, id: &str, params: &KeyParams, page: ListingPage) {
        self.store.put(
            listing_key(scope, id, params),
            CachedValue::Listing(page),
            self.config.ttl_for(EntityKind::Listing),
        );
    }

    pub fn get_document(&self, id: &str) -> Option<BlogPost> {
        match self.store.get(&document_key(id))? {
            CachedValue::Document(post) => Some(post),
            _ => None,
        }
    }

    /// Cache a single post; `ttl` overrides the document default.
    pub fn put_document(&self, id: &str, post: BlogPost, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or_else(|| self.config.ttl_for(EntityKind::Document));
        self.store
            .put(document_key(id), CachedValue::Document(post), ttl);
    }

    pub fn get_author_view(&self, author_id: &str) -> Option<AuthorView> {
        match self.store.get(&author_key(author_id))? {
            CachedValue::Author(view) => Some(view),
            _ => None,
        }
    }

    pub fn put_author_view(&self, author_id: &str, view: AuthorView) {
        self.store.put(
            author_key(author_id),
            CachedValue::Author(view),
            self.config.ttl_for(EntityKind::Author),
        );
    }

    /// Drop every entry that may embed data of `kind`.
    pub fn invalidate_kind(&self, kind: EntityKind) -> usize {
        let removed: usize = dependents(kind)
            .iter()
            .map(|dependent| self.store.invalidate(Some(&dependent.namespace())))
            .sum();
        info!(kind = %kind, removed, "Invalidated cached namespace");
        removed
    }

    pub fn clear(&self) -> usize {
        self.store.invalidate(None)
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }
}

// Listings embed authors and author views embed posts, so invalidation fans
// out from the written kind to every namespace derived from it.
fn dependents(kind: EntityKind) -> &'static [EntityKind] {
    match kind {
        EntityKind::Document => &[EntityKind::Document, EntityKind::Listing, EntityKind::Author],
        EntityKind::User => &[EntityKind::User, EntityKind::Listing, EntityKind::Author],
        EntityKind::Listing => &[EntityKind::Listing, EntityKind::Author],
        EntityKind::Author => &[EntityKind::Author],
    }
}

fn user_key(id: &str) -> CacheKey {
    make_key(EntityKind::User, id, &KeyParams::new())
}

fn document_key(id: &str) -> CacheKey {
    make_key(EntityKind::Document, id, &KeyParams::new())
}

fn listing_key(scope: &str, id: &str, params: &KeyParams) -> CacheKey {
    make_key(EntityKind::Listing, &format!("{scope}:{id}"), params)
}

fn author_key(author_id: &str) -> CacheKey {
    make_key(EntityKind::Author, author_id, &KeyParams::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> DomainCache {
        DomainCache::from_config(CacheConfig::default())
    }

    fn post(id: &str) -> BlogPost {
        let mut post = BlogPost::missing(id);
        post.user_id = "u1".into();
        post.title = format!("title {id}");
        post
    }

    fn user(id: &str) -> User {
        let mut user = User::unknown(id);
        user.first_name = "Ada".into();
        user
    }

    #[test]
    fn typed_round_trips() {
        let cache = cache();
        cache.put_user("u1", user("u1"));
        cache.put_document("p1", post("p1"), None);
        cache.put_listing("blogs", "all", &KeyParams::new(), vec![post("p1")]);
        cache.put_author_view(
            "u1",
            AuthorView {
                author: user("u1"),
                posts: vec![post("p1")],
            },
        );

        assert_eq!(cache.get_user("u1"), Some(user("u1")));
        assert_eq!(cache.get_document("p1"), Some(post("p1")));
        assert_eq!(
            cache.get_listing("blogs", "all", &KeyParams::new()),
            Some(vec![post("p1")])
        );
        assert_eq!(cache.get_author_view("u1").map(|view| view.posts.len()), Some(1));
        assert!(cache.get_user("u2").is_none());
    }

    #[test]
    fn kinds_do_not_collide_on_same_id() {
        let cache = cache();
        cache.put_user("x", user("x"));
        assert!(cache.get_document("x").is_none());
        assert!(cache.get_author_view("x").is_none());
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn listing_params_are_part_of_key() {
        let cache = cache();
        let page_one = KeyParams::new().with("page", 1);
        cache.put_listing("blogs", "all", &page_one, vec![post("p1")]);

        assert!(cache.get_listing("blogs", "all", &KeyParams::new()).is_none());
        assert!(cache.get_listing("blogs", "all", &page_one).is_some());
    }

    #[test]
    fn listing_page_keeps_resume_marker() {
        let cache = cache();
        let params = KeyParams::new().with("limit", 1);
        cache.put_listing_page(
            "blogs",
            "all",
            &params,
            ListingPage {
                posts: vec![post("p2")],
                next_marker: Some("opaque".into()),
            },
        );

        let page = cache
            .get_listing_page("blogs", "all", &params)
            .expect("cached page");
        assert_eq!(page.next_marker.as_deref(), Some("opaque"));
        assert_eq!(cache.get_listing("blogs", "all", &params), Some(vec![post("p2")]));
    }

    #[test]
    fn document_invalidation_keeps_users() {
        let cache = cache();
        cache.put_user("u1", user("u1"));
        cache.put_document("p1", post("p1"), None);
        cache.put_listing("blogs", "all", &KeyParams::new(), vec![post("p1")]);
        cache.put_author_view(
            "u1",
            AuthorView {
                author: user("u1"),
                posts: vec![],
            },
        );

        assert_eq!(cache.invalidate_kind(EntityKind::Document), 3);
        assert!(cache.get_user("u1").is_some());
        assert!(cache.get_document("p1").is_none());
        assert!(cache.get_listing("blogs", "all", &KeyParams::new()).is_none());
        assert!(cache.get_author_view("u1").is_none());
    }

    #[test]
    fn user_invalidation_drops_embedding_views() {
        let cache = cache();
        cache.put_user("u1", user("u1"));
        cache.put_document("p1", post("p1"), None);
        cache.put_listing("blogs", "user:u1", &KeyParams::new(), vec![post("p1")]);

        assert_eq!(cache.invalidate_kind(EntityKind::User), 2);
        assert!(cache.get_document("p1").is_some());
    }

    #[test]
    fn unbounded_user_ttl_still_caches() {
        let cache = DomainCache::from_config(CacheConfig {
            user_ttl_secs: u64::MAX,
            ..CacheConfig::default()
        });
        cache.put_user("u1", user("u1"));
        assert_eq!(cache.get_user("u1"), Some(user("u1")));
    }

    #[test]
    fn clear_removes_everything() {
        let cache = cache();
        cache.put_user("u1", user("u1"));
        cache.put_document("p1", post("p1"), None);
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn document_ttl_override() {
        let cache = cache();
        cache.put_document("short", post("short"), Some(Duration::from_secs(1)));
        cache.put_document("default", post("default"), None);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get_document("short").is_none());
        assert!(cache.get_document("default").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn listings_expire_before_users() {
        let cache = cache();
        cache.put_user("u1", user("u1"));
        cache.put_listing("blogs", "all", &KeyParams::new(), vec![post("p1")]);

        tokio::time::advance(Duration::from_secs(121)).await;
        assert!(cache.get_listing("blogs", "all", &KeyParams::new()).is_none());
        assert!(cache.get_user("u1").is_some());
    }
}

//! Blog data access: reads go through the cache, writes invalidate it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use crate::application::error::AppError;
use crate::application::pagination::{Marker, PaginationCursor};
use crate::application::repos::{
    DocumentQuery, DocumentStore, FieldFilter, IdentityProvider, NetworkQuality, OrderBy,
    QueryPage, StoredDocument,
};
use crate::application::shaping::should_use_cache;
use crate::cache::{BatchResolver, DomainCache, EntityKind, KeyParams, ListingPage, mutex_lock};
use crate::domain::entities::{
    AuthorView, BLOGS_COLLECTION, BlogPost, FeedPage, NewPost, PostPatch, ProfilePatch,
    USERS_COLLECTION, User,
};

const SOURCE: &str = "application::blog";
const LISTING_SCOPE: &str = "blogs";
const FEED_LISTING: &str = "all";
const CREATED_AT: &str = "createdAt";
const USER_ID: &str = "userId";

/// Read/write access to posts and profiles backed by the document store.
pub struct BlogService {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    network: Arc<dyn NetworkQuality>,
    cache: DomainCache,
    resolver: BatchResolver,
    feed_cursor: Mutex<PaginationCursor>,
    page_size: usize,
}

impl BlogService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        network: Arc<dyn NetworkQuality>,
        cache: DomainCache,
    ) -> Self {
        let page_size = cache.config().feed_page_size_non_zero().get();
        Self {
            store,
            identity,
            network,
            resolver: BatchResolver::new(cache.clone()),
            cache,
            feed_cursor: Mutex::new(PaginationCursor::for_query(feed_shape())),
            page_size,
        }
    }

    pub fn cache(&self) -> &DomainCache {
        &self.cache
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[instrument(skip(self, content))]
    pub async fn create_post(
        &self,
        user_id: &str,
        title: &str,
        content: &str,
    ) -> Result<String, AppError> {
        let draft = NewPost::new(user_id, title, content)?;
        let id = self
            .store
            .create_document(BLOGS_COLLECTION, draft.to_document(OffsetDateTime::now_utc()))
            .await?;
        self.cache.invalidate_kind(EntityKind::Document);
        info!(post_id = %id, "Post created");
        Ok(id)
    }

    /// Newest-first page of the public feed with authors joined in.
    ///
    /// `first_page` restarts the feed; otherwise the page after the last
    /// full page is returned. When the shaper allows cache use, each page is
    /// cached under its resume marker together with the marker the store
    /// reported for it.
    #[instrument(skip(self))]
    pub async fn feed_page(&self, first_page: bool) -> Result<FeedPage, AppError> {
        let use_cache = should_use_cache(self.network.as_ref());
        let after = {
            let mut cursor = mutex_lock(&self.feed_cursor, SOURCE, "feed_page.marker");
            if first_page {
                cursor.reset();
            }
            cursor.marker().cloned()
        };
        let params = self.feed_params(after.as_ref());

        if use_cache {
            if let Some(cached) = self.cache.get_listing_page(LISTING_SCOPE, FEED_LISTING, &params) {
                let has_more = cached.posts.len() == self.page_size;
                if has_more {
                    if let Some(marker) = cached.next_marker {
                        mutex_lock(&self.feed_cursor, SOURCE, "feed_page.seek")
                            .seek(Marker::new(marker));
                    }
                }
                debug!(count = cached.posts.len(), has_more, "Serving feed page from cache");
                return Ok(FeedPage {
                    posts: cached.posts,
                    has_more,
                });
            }
        }

        let (page, posts) = self.fetch_feed_page(after).await?;
        let has_more =
            mutex_lock(&self.feed_cursor, SOURCE, "feed_page.advance").advance(&page, self.page_size);

        if use_cache {
            self.cache.put_listing_page(
                LISTING_SCOPE,
                FEED_LISTING,
                &params,
                listing_page(posts.clone(), &page, self.page_size),
            );
        }

        debug!(count = posts.len(), has_more, "Loaded feed page");
        Ok(FeedPage { posts, has_more })
    }

    /// Warm the cache with the feed page after the cursor without moving it.
    ///
    /// Does nothing at the start of the feed, when the shaper bypasses the
    /// cache, or when that page is already cached. Returns whether a page was
    /// fetched.
    #[instrument(skip(self))]
    pub async fn prefetch_next_page(&self) -> Result<bool, AppError> {
        if !should_use_cache(self.network.as_ref()) {
            return Ok(false);
        }
        let Some(after) = mutex_lock(&self.feed_cursor, SOURCE, "prefetch.marker")
            .marker()
            .cloned()
        else {
            return Ok(false);
        };

        let params = self.feed_params(Some(&after));
        if self
            .cache
            .get_listing_page(LISTING_SCOPE, FEED_LISTING, &params)
            .is_some()
        {
            return Ok(false);
        }

        let (page, posts) = self.fetch_feed_page(Some(after)).await?;
        debug!(count = posts.len(), "Prefetched next feed page");
        self.cache.put_listing_page(
            LISTING_SCOPE,
            FEED_LISTING,
            &params,
            listing_page(posts, &page, self.page_size),
        );
        Ok(true)
    }

    /// Every post by `user_id`, newest first, without author data.
    #[instrument(skip(self))]
    pub async fn posts_by_user(&self, user_id: &str) -> Result<Vec<BlogPost>, AppError> {
        let use_cache = should_use_cache(self.network.as_ref());
        let listing = user_listing(user_id);

        if use_cache {
            if let Some(posts) = self.cache.get_listing(LISTING_SCOPE, &listing, &KeyParams::new()) {
                return Ok(posts);
            }
        }

        let query = DocumentQuery::new()
            .filter(FieldFilter::equals(USER_ID, user_id))
            .order_by(OrderBy::descending(CREATED_AT));
        let page = self.store.query_documents(BLOGS_COLLECTION, &query).await?;
        let posts = decode_posts(&page.documents)?;

        if use_cache {
            self.cache
                .put_listing(LISTING_SCOPE, &listing, &KeyParams::new(), posts.clone());
        }
        Ok(posts)
    }

    /// An author's profile together with their posts.
    ///
    /// A missing or unreadable profile falls back to the "Unknown User"
    /// placeholder; failing to load the posts fails the call.
    #[instrument(skip(self))]
    pub async fn author_view(&self, author_id: &str) -> Result<AuthorView, AppError> {
        let use_cache = should_use_cache(self.network.as_ref());
        if use_cache {
            if let Some(view) = self.cache.get_author_view(author_id) {
                return Ok(view);
            }
        }

        let (posts, author) = futures::join!(self.posts_by_user(author_id), self.user(author_id));
        let posts = posts?;
        let author = match author {
            Ok(Some(author)) => author,
            Ok(None) => User::unknown(author_id),
            Err(err) => {
                warn!(author_id, error = %err, "Author profile unavailable; using placeholder");
                User::unknown(author_id)
            }
        };

        let view = AuthorView { author, posts };
        if use_cache {
            self.cache.put_author_view(author_id, view.clone());
        }
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn post(&self, id: &str) -> Result<Option<BlogPost>, AppError> {
        let use_cache = should_use_cache(self.network.as_ref());
        if use_cache {
            if let Some(post) = self.cache.get_document(id) {
                return Ok(Some(post));
            }
        }

        let Some(data) = self.store.get_document(BLOGS_COLLECTION, id).await? else {
            return Ok(None);
        };
        let post = BlogPost::from_document(id, data)?;
        if use_cache {
            self.cache.put_document(id, post.clone(), None);
        }
        Ok(Some(post))
    }

    #[instrument(skip(self, patch))]
    pub async fn update_post(&self, id: &str, patch: PostPatch) -> Result<(), AppError> {
        self.store
            .update_document(BLOGS_COLLECTION, id, patch.to_document(OffsetDateTime::now_utc()))
            .await?;
        self.cache.invalidate_kind(EntityKind::Document);
        info!(post_id = id, "Post updated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_post(&self, id: &str) -> Result<(), AppError> {
        self.store.delete_document(BLOGS_COLLECTION, id).await?;
        self.cache.invalidate_kind(EntityKind::Document);
        info!(post_id = id, "Post deleted");
        Ok(())
    }

    /// Cache-first profile lookup; used regardless of connection quality.
    #[instrument(skip(self))]
    pub async fn user(&self, id: &str) -> Result<Option<User>, AppError> {
        if let Some(user) = self.cache.get_user(id) {
            return Ok(Some(user));
        }
        let user = self.fetch_user(id.to_string()).await?;
        if let Some(user) = &user {
            self.cache.put_user(id, user.clone());
        }
        Ok(user)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_profile(&self, user_id: &str, patch: ProfilePatch) -> Result<(), AppError> {
        if patch.is_empty() {
            return Err(AppError::validation("profile update has no fields"));
        }
        self.store
            .update_document(USERS_COLLECTION, user_id, patch.to_document())
            .await?;
        self.cache.invalidate_kind(EntityKind::User);
        info!(user_id, "Profile updated");
        Ok(())
    }

    /// Posts of the signed-in user.
    pub async fn current_user_posts(&self) -> Result<Vec<BlogPost>, AppError> {
        let user_id = self
            .identity
            .current_user_id()
            .ok_or(AppError::Unauthenticated)?;
        self.posts_by_user(&user_id).await
    }

    async fn fetch_user(&self, id: String) -> Result<Option<User>, AppError> {
        match self.store.get_document(USERS_COLLECTION, &id).await? {
            Some(data) => Ok(Some(User::from_document(&id, data)?)),
            None => Ok(None),
        }
    }

    async fn join_authors(&self, posts: Vec<BlogPost>) -> Vec<BlogPost> {
        let author_ids: Vec<String> = posts.iter().map(|post| post.user_id.clone()).collect();
        let authors: HashMap<String, User> = self
            .resolver
            .resolve_many(&author_ids, |id| self.fetch_user(id))
            .await
            .into_iter()
            .map(|(id, resolution)| (id, resolution.into_value()))
            .collect();

        posts
            .into_iter()
            .map(|post| {
                let author = authors
                    .get(&post.user_id)
                    .cloned()
                    .unwrap_or_else(|| User::unknown(post.user_id.as_str()));
                post.with_author(author)
            })
            .collect()
    }

    async fn fetch_feed_page(
        &self,
        after: Option<Marker>,
    ) -> Result<(QueryPage, Vec<BlogPost>), AppError> {
        let query = DocumentQuery::new()
            .order_by(OrderBy::descending(CREATED_AT))
            .limit(self.page_size)
            .start_after(after);
        let page = self.store.query_documents(BLOGS_COLLECTION, &query).await?;
        let posts = decode_posts(&page.documents)?;
        let posts = self.join_authors(posts).await;
        Ok((page, posts))
    }

    fn feed_params(&self, after: Option<&Marker>) -> KeyParams {
        let params = KeyParams::new().with("limit", self.page_size as u64);
        match after {
            Some(marker) => params.with("after", marker.as_str()),
            None => params,
        }
    }
}

fn feed_shape() -> String {
    format!("{LISTING_SCOPE}:{FEED_LISTING}")
}

fn user_listing(user_id: &str) -> String {
    format!("user:{user_id}")
}

fn decode_posts(documents: &[StoredDocument]) -> Result<Vec<BlogPost>, AppError> {
    documents
        .iter()
        .map(|doc| BlogPost::from_document(&doc.id, doc.data.clone()).map_err(AppError::from))
        .collect()
}

// Keeps the store's own marker only for full pages, mirroring the cursor.
fn listing_page(posts: Vec<BlogPost>, page: &QueryPage, page_size: usize) -> ListingPage {
    let next_marker = (page.documents.len() == page_size)
        .then(|| page.last_marker.as_ref().map(|marker| marker.as_str().to_string()))
        .flatten();
    ListingPage { posts, next_marker }
}

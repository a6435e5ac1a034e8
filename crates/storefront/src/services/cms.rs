//! Blog posts from the headless CMS.
//!
//! The CMS stores post bodies as markdown; they are rendered here with the
//! same renderer as static pages. Listings and posts are cached for five
//! minutes since editors publish a few times a week at most.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::CmsConfig;
use crate::content::{reading_time_minutes, render_markdown};

/// Upper bound for [`CmsClient::all_posts`].
const ALL_POSTS_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum CmsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// A published blog post, rendered for display.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BlogPost {
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub featured_image: Option<String>,
    pub tags: Vec<String>,
    pub content_html: String,
    pub reading_time_minutes: u32,
}

impl BlogPost {
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// One page of a post listing.
#[derive(Debug, Clone, Default)]
pub struct PostPage {
    pub posts: Vec<BlogPost>,
    /// Published posts across all pages.
    pub total: u64,
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct PostsResponse {
    #[serde(default)]
    posts: Vec<WirePost>,
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    post: WirePost,
}

#[derive(Debug, Deserialize)]
struct WirePost {
    slug: String,
    title: String,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    author: Option<WireAuthor>,
    /// Drafts have no publish date.
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    featured_image: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAuthor {
    name: String,
}

impl WirePost {
    fn is_draft(&self) -> bool {
        self.published_at.is_none()
            || self
                .status
                .as_deref()
                .is_some_and(|s| !s.eq_ignore_ascii_case("published"))
    }

    /// `None` for drafts.
    fn into_post(self) -> Option<BlogPost> {
        if self.is_draft() {
            return None;
        }
        let published_at = self.published_at?;

        Some(BlogPost {
            content_html: render_markdown(&self.body),
            reading_time_minutes: reading_time_minutes(&self.body),
            slug: self.slug,
            title: self.title,
            excerpt: self.excerpt.filter(|e| !e.trim().is_empty()),
            author: self.author.map(|a| a.name),
            published_at,
            updated_at: self.updated_at,
            featured_image: self.featured_image,
            tags: self.tags,
        })
    }
}

// =============================================================================
// CmsClient
// =============================================================================

#[derive(Debug, Clone)]
enum CacheValue {
    Page(Arc<PostPage>),
    Post(Box<BlogPost>),
}

/// Client for the CMS REST API. Cheap to clone.
#[derive(Clone)]
pub struct CmsClient {
    inner: Arc<CmsClientInner>,
}

struct CmsClientInner {
    client: reqwest::Client,
    api_url: String,
    api_token: SecretString,
    cache: Cache<String, CacheValue>,
}

impl CmsClient {
    #[must_use]
    pub fn new(config: &CmsConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(300))
            .build();

        Self {
            inner: Arc::new(CmsClientInner {
                client: reqwest::Client::new(),
                api_url: config.api_url.clone(),
                api_token: config.api_token.clone(),
                cache,
            }),
        }
    }

    /// GET a path; `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<T>, CmsError> {
        let response = self
            .inner
            .client
            .get(format!("{}{path}", self.inner.api_url))
            .bearer_auth(self.inner.api_token.expose_secret())
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CmsError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| CmsError::Parse(e.to_string()))
    }

    /// One page of published posts, newest first, optionally filtered by tag.
    ///
    /// `page` is 1-based.
    ///
    /// # Errors
    ///
    /// Returns an error if the CMS request fails or returns malformed JSON.
    #[instrument(skip(self))]
    pub async fn list_posts(
        &self,
        page: u32,
        per_page: u32,
        tag: Option<&str>,
    ) -> Result<PostPage, CmsError> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let tag = tag.map(str::trim).filter(|t| !t.is_empty());
        let cache_key = format!("posts:{page}:{per_page}:{}", tag.unwrap_or(""));

        if let Some(CacheValue::Page(cached)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for post listing");
            return Ok(cached.as_ref().clone());
        }

        let page_param = page.to_string();
        let per_page_param = per_page.to_string();
        let mut params = vec![
            ("page", page_param.as_str()),
            ("per_page", per_page_param.as_str()),
            ("status", "published"),
            ("order", "published_at_desc"),
        ];
        if let Some(tag) = tag {
            params.push(("tag", tag));
        }

        let response: PostsResponse = self
            .get_json("/posts", &params)
            .await?
            .unwrap_or(PostsResponse {
                posts: Vec::new(),
                total: Some(0),
            });

        let fetched = response.posts.len() as u64;
        let mut posts: Vec<BlogPost> = response
            .posts
            .into_iter()
            .filter_map(WirePost::into_post)
            .collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));

        let dropped = fetched - posts.len() as u64;
        let total = response
            .total
            .map_or(posts.len() as u64, |t| t.saturating_sub(dropped));

        let result = PostPage { posts, total };
        self.inner
            .cache
            .insert(cache_key, CacheValue::Page(Arc::new(result.clone())))
            .await;
        Ok(result)
    }

    /// A single published post. Drafts and unknown slugs are `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the CMS request fails or returns malformed JSON.
    #[instrument(skip(self))]
    pub async fn get_post(&self, slug: &str) -> Result<Option<BlogPost>, CmsError> {
        let cache_key = format!("post:{slug}");
        if let Some(CacheValue::Post(post)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for post");
            return Ok(Some(*post));
        }

        let path = format!("/posts/{}", urlencoding::encode(slug));
        let Some(response) = self.get_json::<PostResponse>(&path, &[]).await? else {
            return Ok(None);
        };
        let Some(post) = response.post.into_post() else {
            return Ok(None);
        };

        self.inner
            .cache
            .insert(cache_key, CacheValue::Post(Box::new(post.clone())))
            .await;
        Ok(Some(post))
    }

    /// Up to 100 newest posts, for recipe suggestions.
    ///
    /// # Errors
    ///
    /// Returns an error if the CMS request fails or returns malformed JSON.
    pub async fn all_posts(&self) -> Result<Vec<BlogPost>, CmsError> {
        Ok(self.list_posts(1, ALL_POSTS_LIMIT, None).await?.posts)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn wire(value: serde_json::Value) -> WirePost {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_published_post_is_rendered() {
        let post = wire(serde_json::json!({
            "slug": "rye-starter",
            "title": "Keeping a Rye Starter",
            "body": "Feed it **daily**.",
            "author": {"name": "Ana"},
            "published_at": "2026-09-01T08:00:00Z",
            "tags": ["Sourdough", "rye"],
            "status": "published"
        }))
        .into_post()
        .unwrap();

        assert!(post.content_html.contains("<strong>daily</strong>"));
        assert_eq!(post.reading_time_minutes, 1);
        assert_eq!(post.author.as_deref(), Some("Ana"));
        assert!(post.has_tag("sourdough"));
        assert!(!post.has_tag("wheat"));
    }

    #[test]
    fn test_drafts_are_excluded() {
        let unpublished = wire(serde_json::json!({
            "slug": "wip", "title": "WIP", "body": "soon"
        }));
        assert!(unpublished.into_post().is_none());

        let draft = wire(serde_json::json!({
            "slug": "wip", "title": "WIP", "body": "soon",
            "published_at": "2026-09-01T08:00:00Z", "status": "draft"
        }));
        assert!(draft.into_post().is_none());
    }

    #[test]
    fn test_blank_excerpt_is_dropped() {
        let post = wire(serde_json::json!({
            "slug": "a", "title": "A", "excerpt": "  ",
            "published_at": "2026-09-01T08:00:00Z"
        }))
        .into_post()
        .unwrap();
        assert!(post.excerpt.is_none());
    }
}

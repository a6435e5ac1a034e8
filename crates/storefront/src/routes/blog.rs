//! Blog route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use larder_core::Pagination;
use serde::Deserialize;
use tracing::{instrument, warn};

use super::PageChrome;
use super::products::ProductCardView;
use crate::error::{AppError, Result};
use crate::filters;
use crate::services::cms::{BlogPost, PostPage};
use crate::services::recipes;
use crate::state::AppState;

/// Posts per blog index page.
const POSTS_PER_PAGE: u32 = 9;

/// Products scanned for matches on a post page.
const RELATED_CANDIDATES: i64 = 50;

const RELATED_PRODUCTS: usize = 4;

/// A numbered link in the page list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLink {
    pub number: u32,
    pub current: bool,
}

#[derive(Debug, Deserialize)]
pub struct BlogQuery {
    pub page: Option<u32>,
    pub tag: Option<String>,
}

/// Blog index page template.
#[derive(Template, WebTemplate)]
#[template(path = "blog/index.html")]
pub struct BlogIndexTemplate {
    pub chrome: PageChrome,
    pub posts: Vec<BlogPost>,
    pub pagination: Pagination,
    pub pages: Vec<PageLink>,
    pub tag: Option<String>,
    /// `&tag=...` suffix for page links; empty without a tag.
    pub tag_query: String,
    pub unavailable: bool,
}

/// Blog post detail template.
#[derive(Template, WebTemplate)]
#[template(path = "blog/show.html")]
pub struct BlogShowTemplate {
    pub chrome: PageChrome,
    pub post: BlogPost,
    pub related_products: Vec<ProductCardView>,
}

/// Display the blog index.
#[instrument(skip(state, chrome))]
pub async fn index(
    State(state): State<AppState>,
    chrome: PageChrome,
    Query(query): Query<BlogQuery>,
) -> impl IntoResponse {
    let tag = query
        .tag
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let requested = query.page.unwrap_or(1).max(1);
    let cms = state.cms();

    let mut unavailable = false;
    let mut listing = cms
        .list_posts(requested, POSTS_PER_PAGE, tag.as_deref())
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load blog posts");
            unavailable = true;
            PostPage::default()
        });

    let pagination = Pagination::new(listing.total, POSTS_PER_PAGE, requested);
    if !unavailable && pagination.current_page != requested {
        // Past the last page: show the last page instead of an empty one.
        listing = cms
            .list_posts(pagination.current_page, POSTS_PER_PAGE, tag.as_deref())
            .await
            .unwrap_or_default();
    }

    let tag_query = tag
        .as_deref()
        .map(|t| format!("&tag={}", urlencoding::encode(t)))
        .unwrap_or_default();

    BlogIndexTemplate {
        chrome,
        posts: listing.posts,
        pages: pagination
            .window(2)
            .into_iter()
            .map(|number| PageLink {
                number,
                current: number == pagination.current_page,
            })
            .collect(),
        pagination,
        tag,
        tag_query,
        unavailable,
    }
}

/// Display a blog post with products sharing its tags.
///
/// An unreachable CMS is reported as a missing post.
#[instrument(skip(state, chrome))]
pub async fn show(
    State(state): State<AppState>,
    chrome: PageChrome,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let post = match state.cms().get_post(&slug).await {
        Ok(Some(post)) => post,
        Ok(None) => return Err(AppError::NotFound(format!("Post {slug}"))),
        Err(e) => {
            warn!(error = %e, "Failed to load blog post");
            return Err(AppError::NotFound(format!("Post {slug}")));
        }
    };

    let related_products = if post.tags.is_empty() {
        Vec::new()
    } else {
        match state
            .storefront()
            .get_products(RELATED_CANDIDATES, None, None)
            .await
        {
            Ok(connection) => {
                recipes::related_products(&post.tags, &connection.products, RELATED_PRODUCTS)
                    .into_iter()
                    .map(ProductCardView::from)
                    .collect()
            }
            Err(e) => {
                warn!(error = %e, "Related products unavailable");
                Vec::new()
            }
        }
    };

    Ok(BlogShowTemplate {
        chrome,
        post,
        related_products,
    })
}

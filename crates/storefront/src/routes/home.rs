//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::{instrument, warn};

use super::PageChrome;
use super::collections::CollectionView;
use super::products::ProductCardView;
use crate::filters;
use crate::services::cms::BlogPost;
use crate::state::AppState;

/// Collection whose products lead the home page.
const FEATURED_COLLECTION: &str = "frontpage";

const FEATURED_PRODUCTS: i64 = 8;
const LATEST_POSTS: u32 = 3;
const HOME_COLLECTIONS: i64 = 6;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub chrome: PageChrome,
    pub featured: Vec<ProductCardView>,
    pub collections: Vec<CollectionView>,
    pub posts: Vec<BlogPost>,
}

/// Featured products: the front page collection, or the first products in the
/// catalog when that collection is missing.
async fn featured_products(state: &AppState) -> Vec<ProductCardView> {
    let storefront = state.storefront();
    match storefront
        .get_collection_by_handle(FEATURED_COLLECTION, FEATURED_PRODUCTS, None)
        .await
    {
        Ok(collection) if !collection.products.is_empty() => {
            return collection.products.iter().map(ProductCardView::from).collect();
        }
        Ok(_) => {}
        Err(e) if e.is_not_found() => {}
        Err(e) => warn!(error = %e, "Featured collection unavailable"),
    }

    match storefront.get_products(FEATURED_PRODUCTS, None, None).await {
        Ok(connection) => connection.products.iter().map(ProductCardView::from).collect(),
        Err(e) => {
            warn!(error = %e, "Failed to load featured products");
            Vec::new()
        }
    }
}

/// Display the home page.
///
/// Every section is optional; a failing vendor leaves its section empty.
#[instrument(skip(state, chrome))]
pub async fn home(State(state): State<AppState>, chrome: PageChrome) -> impl IntoResponse {
    let (featured, collections, posts) = tokio::join!(
        featured_products(&state),
        state.storefront().get_collections(HOME_COLLECTIONS, None),
        state.cms().list_posts(1, LATEST_POSTS, None),
    );

    let collections = match collections {
        Ok(connection) => connection
            .collections
            .iter()
            .map(CollectionView::from)
            .collect(),
        Err(e) => {
            warn!(error = %e, "Failed to load collections");
            Vec::new()
        }
    };

    let posts = match posts {
        Ok(page) => page.posts,
        Err(e) => {
            warn!(error = %e, "Failed to load blog posts");
            Vec::new()
        }
    };

    HomeTemplate {
        chrome,
        featured,
        collections,
        posts,
    }
}

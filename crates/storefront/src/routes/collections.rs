//! Collection route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{instrument, warn};

use super::PageChrome;
use super::products::ProductCardView;
use crate::error::{AppError, Result};
use crate::filters;
use crate::shopify::{Collection, ShopifyError};
use crate::state::AppState;

/// Collections on the index page.
const COLLECTIONS_PER_PAGE: i64 = 50;

/// Products per collection page.
const PRODUCTS_PER_PAGE: i64 = 24;

/// Collection tile on the index page.
#[derive(Debug, Clone)]
pub struct CollectionView {
    pub handle: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub image_alt: String,
}

impl From<&Collection> for CollectionView {
    fn from(collection: &Collection) -> Self {
        Self {
            handle: collection.handle.clone(),
            title: collection.title.clone(),
            description: collection.description.clone(),
            image_url: collection.image.as_ref().map(|i| i.url.clone()),
            image_alt: collection
                .image
                .as_ref()
                .and_then(|i| i.alt_text.clone())
                .unwrap_or_else(|| collection.title.clone()),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "collections/index.html")]
pub struct CollectionsIndexTemplate {
    pub chrome: PageChrome,
    pub collections: Vec<CollectionView>,
    pub unavailable: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "collections/show.html")]
pub struct CollectionShowTemplate {
    pub chrome: PageChrome,
    pub collection: CollectionView,
    pub products: Vec<ProductCardView>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CollectionQuery {
    pub after: Option<String>,
}

/// Display collection listing page.
#[instrument(skip(state, chrome))]
pub async fn index(State(state): State<AppState>, chrome: PageChrome) -> impl IntoResponse {
    let (collections, unavailable) = match state
        .storefront()
        .get_collections(COLLECTIONS_PER_PAGE, None)
        .await
    {
        Ok(connection) => (
            connection
                .collections
                .iter()
                .map(CollectionView::from)
                .collect(),
            false,
        ),
        Err(e) => {
            warn!(error = %e, "Failed to load collections");
            (Vec::new(), true)
        }
    };

    CollectionsIndexTemplate {
        chrome,
        collections,
        unavailable,
    }
}

/// Display one collection with a page of its products.
#[instrument(skip(state, chrome))]
pub async fn show(
    State(state): State<AppState>,
    chrome: PageChrome,
    Path(handle): Path<String>,
    Query(query): Query<CollectionQuery>,
) -> Result<impl IntoResponse> {
    let after = query.after.filter(|a| !a.is_empty());
    let collection = state
        .storefront()
        .get_collection_by_handle(&handle, PRODUCTS_PER_PAGE, after)
        .await
        .map_err(|e| match e {
            ShopifyError::NotFound(_) => AppError::NotFound(format!("Collection {handle}")),
            other => AppError::Shopify(other),
        })?;

    let next_cursor = collection
        .products_page_info
        .end_cursor
        .clone()
        .filter(|_| collection.products_page_info.has_next_page)
        .map(|c| urlencoding::encode(&c).into_owned());

    Ok(CollectionShowTemplate {
        chrome,
        collection: CollectionView::from(&collection),
        products: collection.products.iter().map(ProductCardView::from).collect(),
        next_cursor,
    })
}

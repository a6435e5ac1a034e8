//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{instrument, warn};

use super::PageChrome;
use crate::error::{AppError, Result};
use crate::filters;
use crate::services::cms::BlogPost;
use crate::services::recipes;
use crate::services::reviews::{NewReview, ReviewSummary, ReviewTarget};
use crate::shopify::{Product, ProductConnection, ShopifyError, VariantInventory};
use crate::state::AppState;

/// Products per listing page.
const PAGE_SIZE: i64 = 24;

/// Recipe posts suggested on a product page.
const SUGGESTED_POSTS: usize = 3;

/// Recommendations shown on a product page.
const RECOMMENDATIONS: usize = 4;

/// Stock at or below which the page shows "Only N left".
const LOW_STOCK: i64 = 5;

// =============================================================================
// Views
// =============================================================================

/// Product card on listings, collections, and recommendation rows.
#[derive(Debug, Clone)]
pub struct ProductCardView {
    pub handle: String,
    pub title: String,
    pub price: String,
    pub compare_at_price: Option<String>,
    pub image_url: Option<String>,
    pub image_alt: String,
    pub available: bool,
    /// "4.8 (23)"
    pub rating: Option<String>,
}

impl From<&Product> for ProductCardView {
    fn from(product: &Product) -> Self {
        let range = &product.price_range;
        let price = if range.is_single_price() {
            range.min_variant_price.display()
        } else {
            format!("From {}", range.min_variant_price.display())
        };

        let compare_at_price = product
            .default_variant()
            .filter(|v| v.is_on_sale())
            .and_then(|v| v.compare_at_price.as_ref())
            .map(crate::shopify::Money::display);

        Self {
            handle: product.handle.clone(),
            title: product.title.clone(),
            price,
            compare_at_price,
            image_url: product.featured_image.as_ref().map(|i| i.url.clone()),
            image_alt: product
                .featured_image
                .as_ref()
                .and_then(|i| i.alt_text.clone())
                .unwrap_or_else(|| product.title.clone()),
            available: product.available_for_sale,
            rating: product
                .rating
                .as_ref()
                .filter(|r| r.count > 0)
                .map(|r| format!("{:.1} ({})", r.value, r.count)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageView {
    pub url: String,
    pub alt: String,
}

#[derive(Debug, Clone)]
pub struct VariantView {
    pub id: String,
    pub title: String,
    pub price: String,
    pub compare_at_price: Option<String>,
    pub available: bool,
    /// "Only 3 left", "Sold out", "Ships when back in stock".
    pub stock_label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SellingPlanView {
    pub id: String,
    pub name: String,
    /// "Save 10%"
    pub savings: Option<String>,
}

/// Everything the product page shows about the product itself.
#[derive(Debug, Clone)]
pub struct ProductDetailView {
    pub id: String,
    pub handle: String,
    pub title: String,
    pub vendor: String,
    pub description_html: String,
    pub images: Vec<ImageView>,
    pub variants: Vec<VariantView>,
    pub selling_plans: Vec<SellingPlanView>,
    pub requires_selling_plan: bool,
    pub available: bool,
}

fn stock_label(available: bool, inventory: Option<&VariantInventory>) -> Option<String> {
    if !available {
        return Some("Sold out".to_string());
    }
    let inventory = inventory?;
    if inventory.currently_not_in_stock {
        return Some("Ships when back in stock".to_string());
    }
    inventory
        .quantity_available
        .filter(|q| (1..=LOW_STOCK).contains(q))
        .map(|q| format!("Only {q} left"))
}

impl ProductDetailView {
    fn new(product: &Product, inventory: &[VariantInventory]) -> Self {
        let variants = product
            .variants
            .iter()
            .map(|v| {
                let stock = inventory.iter().find(|i| i.variant_id == v.id);
                let available = stock.map_or(v.available_for_sale, |s| s.available_for_sale);
                VariantView {
                    id: v.id.clone(),
                    title: v.title.clone(),
                    price: v.price.display(),
                    compare_at_price: v
                        .compare_at_price
                        .as_ref()
                        .filter(|_| v.is_on_sale())
                        .map(crate::shopify::Money::display),
                    available,
                    stock_label: stock_label(available, stock),
                }
            })
            .collect::<Vec<_>>();

        let selling_plans = product
            .selling_plan_groups
            .iter()
            .flat_map(|g| &g.selling_plans)
            .map(|p| SellingPlanView {
                id: p.id.clone(),
                name: p.name.clone(),
                savings: p
                    .discount_percentage()
                    .filter(|pct| *pct > 0.0)
                    .map(|pct| format!("Save {pct:.0}%")),
            })
            .collect();

        Self {
            id: product.id.clone(),
            handle: product.handle.clone(),
            title: product.title.clone(),
            vendor: product.vendor.clone(),
            description_html: product.description_html.clone(),
            images: product
                .images
                .iter()
                .map(|i| ImageView {
                    url: i.url.clone(),
                    alt: i.alt_text.clone().unwrap_or_else(|| product.title.clone()),
                })
                .collect(),
            available: variants.iter().any(|v| v.available),
            variants,
            selling_plans,
            requires_selling_plan: product.requires_selling_plan,
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    /// Cursor of the last product on the previous page.
    pub after: Option<String>,
    pub q: Option<String>,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub chrome: PageChrome,
    pub products: Vec<ProductCardView>,
    /// Search text, empty when browsing.
    pub query: String,
    /// Query string for the next page, including the search text.
    pub next_page: Option<String>,
    pub unavailable: bool,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub chrome: PageChrome,
    pub product: ProductDetailView,
    pub handle: String,
    pub reviews: ReviewSummary,
    pub review_notice: Option<String>,
    pub review_error: Option<String>,
    pub recipes: Vec<BlogPost>,
    pub recommendations: Vec<ProductCardView>,
}

/// Reviews fragment template (HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/reviews.html")]
pub struct ReviewsTemplate {
    pub handle: String,
    pub reviews: ReviewSummary,
    pub review_notice: Option<String>,
    pub review_error: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Product lookup shared by the detail page and review routes.
async fn find_product(state: &AppState, handle: &str) -> Result<Product> {
    state
        .storefront()
        .get_product_by_handle(handle)
        .await
        .map_err(|e| match e {
            ShopifyError::NotFound(_) => AppError::NotFound(format!("Product {handle}")),
            other => AppError::Shopify(other),
        })
}

fn review_target(product: &Product) -> ReviewTarget {
    ReviewTarget {
        handle: product.handle.clone(),
        external_id: product.numeric_id().map(String::from),
    }
}

/// Display product listing page.
#[instrument(skip(state, chrome))]
pub async fn index(
    State(state): State<AppState>,
    chrome: PageChrome,
    Query(query): Query<ListingQuery>,
) -> impl IntoResponse {
    let search = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(String::from);
    let after = query.after.filter(|a| !a.is_empty());

    let (connection, unavailable) = match state
        .storefront()
        .get_products(PAGE_SIZE, after, search.clone())
        .await
    {
        Ok(connection) => (connection, false),
        Err(e) => {
            warn!(error = %e, "Failed to load products");
            (
                ProductConnection {
                    products: Vec::new(),
                    page_info: crate::shopify::PageInfo::default(),
                },
                true,
            )
        }
    };

    let next_page = connection
        .page_info
        .end_cursor
        .filter(|_| connection.page_info.has_next_page)
        .map(|cursor| {
            let mut qs = format!("after={}", urlencoding::encode(&cursor));
            if let Some(q) = &search {
                qs.push_str(&format!("&q={}", urlencoding::encode(q)));
            }
            qs
        });

    ProductsIndexTemplate {
        chrome,
        products: connection.products.iter().map(ProductCardView::from).collect(),
        query: search.unwrap_or_default(),
        next_page,
        unavailable,
    }
}

/// Display product detail page.
///
/// Only the product itself is required; inventory, reviews, recipes and
/// recommendations fall back to empty when their vendor fails.
#[instrument(skip(state, chrome))]
pub async fn show(
    State(state): State<AppState>,
    chrome: PageChrome,
    Path(handle): Path<String>,
) -> Result<impl IntoResponse> {
    let product = find_product(&state, &handle).await?;
    let variant_ids: Vec<String> = product.variants.iter().map(|v| v.id.clone()).collect();
    let target = review_target(&product);

    let (inventory, reviews, posts, recommendations) = tokio::join!(
        state.storefront().get_variant_inventory(&variant_ids),
        state.reviews().product_reviews(&target),
        state.cms().all_posts(),
        state.storefront().get_product_recommendations(&product.id),
    );

    let inventory = inventory.unwrap_or_else(|e| {
        warn!(error = %e, "Inventory lookup failed");
        Vec::new()
    });
    let posts = posts.unwrap_or_else(|e| {
        warn!(error = %e, "Recipe posts unavailable");
        Vec::new()
    });
    let recommendations = recommendations.unwrap_or_else(|e| {
        warn!(error = %e, "Recommendations unavailable");
        Vec::new()
    });

    Ok(ProductShowTemplate {
        chrome,
        product: ProductDetailView::new(&product, &inventory),
        handle: product.handle.clone(),
        reviews,
        review_notice: None,
        review_error: None,
        recipes: recipes::suggest(&product.tags, &posts, SUGGESTED_POSTS)
            .into_iter()
            .cloned()
            .collect(),
        recommendations: recommendations
            .iter()
            .filter(|p| p.id != product.id)
            .take(RECOMMENDATIONS)
            .map(ProductCardView::from)
            .collect(),
    })
}

/// Reviews fragment (HTMX).
#[instrument(skip(state))]
pub async fn reviews(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<impl IntoResponse> {
    let product = find_product(&state, &handle).await?;
    let reviews = state.reviews().product_reviews(&review_target(&product)).await;

    Ok(ReviewsTemplate {
        handle: product.handle,
        reviews,
        review_notice: None,
        review_error: None,
    })
}

#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub rating: u8,
    #[serde(default)]
    pub title: String,
    pub body: String,
    pub name: String,
    pub email: String,
}

/// Submit a review; answers with the refreshed reviews fragment.
#[instrument(skip(state, form), fields(rating = form.rating))]
pub async fn submit_review(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    Form(form): Form<ReviewForm>,
) -> Result<Response> {
    let product = find_product(&state, &handle).await?;
    let target = review_target(&product);

    let review = match NewReview::validate(
        target.clone(),
        form.rating,
        &form.title,
        &form.body,
        &form.name,
        &form.email,
    ) {
        Ok(review) => review,
        Err(e) => {
            let reviews = state.reviews().product_reviews(&target).await;
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                ReviewsTemplate {
                    handle: product.handle,
                    reviews,
                    review_notice: None,
                    review_error: Some(e.to_string()),
                },
            )
                .into_response());
        }
    };

    let (notice, error) = match state.reviews().submit_review(&review).await {
        Ok(()) => (
            Some("Thanks! Your review will appear once it is published.".to_string()),
            None,
        ),
        Err(e) => {
            warn!(error = %e, "Review submission failed");
            (
                None,
                Some("We couldn't save your review. Please try again later.".to_string()),
            )
        }
    };

    let reviews = state.reviews().product_reviews(&target).await;
    Ok(ReviewsTemplate {
        handle: product.handle,
        reviews,
        review_notice: notice,
        review_error: error,
    }
    .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::shopify::{Money, PriceRange, ProductVariant};

    fn money(amount: &str) -> Money {
        Money {
            amount: amount.to_string(),
            currency_code: "USD".to_string(),
        }
    }

    fn variant(id: &str, price: &str, compare_at: Option<&str>, available: bool) -> ProductVariant {
        ProductVariant {
            id: id.to_string(),
            title: id.to_string(),
            available_for_sale: available,
            quantity_available: None,
            sku: None,
            price: money(price),
            compare_at_price: compare_at.map(money),
            selected_options: Vec::new(),
            image: None,
        }
    }

    fn product() -> Product {
        Product {
            id: "gid://shopify/Product/1".to_string(),
            handle: "rye-flour".to_string(),
            title: "Rye Flour".to_string(),
            available_for_sale: true,
            price_range: PriceRange {
                min_variant_price: money("6.00"),
                max_variant_price: money("11.00"),
            },
            variants: vec![
                variant("V1", "6.00", Some("8.00"), true),
                variant("V2", "11.00", None, true),
            ],
            ..Product::default()
        }
    }

    fn inventory(
        variant_id: &str,
        available: bool,
        backorder: bool,
        quantity: Option<i64>,
    ) -> VariantInventory {
        VariantInventory {
            variant_id: variant_id.to_string(),
            product_handle: None,
            available_for_sale: available,
            currently_not_in_stock: backorder,
            quantity_available: quantity,
        }
    }

    #[test]
    fn test_card_price_range_and_sale() {
        let card = ProductCardView::from(&product());
        assert_eq!(card.price, "From $6.00");
        assert_eq!(card.compare_at_price.as_deref(), Some("$8.00"));
        assert_eq!(card.image_alt, "Rye Flour");
        assert!(card.rating.is_none());
    }

    #[test]
    fn test_detail_merges_inventory() {
        let view = ProductDetailView::new(
            &product(),
            &[
                inventory("V1", true, false, Some(3)),
                inventory("V2", false, false, Some(0)),
            ],
        );
        assert_eq!(view.variants[0].stock_label.as_deref(), Some("Only 3 left"));
        assert!(!view.variants[1].available);
        assert_eq!(view.variants[1].stock_label.as_deref(), Some("Sold out"));
        assert!(view.available);
    }

    #[test]
    fn test_stock_labels() {
        assert_eq!(stock_label(true, None), None);
        assert_eq!(
            stock_label(true, Some(&inventory("V", true, true, Some(-2)))).as_deref(),
            Some("Ships when back in stock")
        );
        assert_eq!(stock_label(true, Some(&inventory("V", true, false, Some(40)))), None);
    }
}

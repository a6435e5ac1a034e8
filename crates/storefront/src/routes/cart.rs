//! Cart route handlers.
//!
//! The session cart is updated synchronously; the backend mirror is pushed by
//! the debounced syncer. Mutations answer HTMX requests with a fragment and
//! an `HX-Trigger: cart-updated` header, and plain form posts with a redirect.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use super::{PageChrome, is_htmx};
use crate::cart::{LocalCart, LocalCartLine, MAX_LINE_QUANTITY};
use crate::error::add_breadcrumb;
use crate::filters;
use crate::models::Flash;
use crate::shopify::{Product, ShopifyError};
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// Cart line for display.
#[derive(Debug, Clone)]
pub struct CartLineView {
    pub product_id: String,
    pub handle: String,
    pub title: String,
    /// Empty for single-variant products.
    pub variant_title: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
    pub image_url: Option<String>,
    pub subscription: bool,
}

impl From<&LocalCartLine> for CartLineView {
    fn from(line: &LocalCartLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            handle: line.handle.clone(),
            title: line.title.clone(),
            variant_title: if line.variant_title == "Default Title" {
                String::new()
            } else {
                line.variant_title.clone()
            },
            quantity: line.quantity,
            unit_price: line.unit_price.display(),
            line_total: line.line_total().display(),
            image_url: line.image_url.clone(),
            subscription: line.selling_plan_id.is_some(),
        }
    }
}

/// Cart for display.
#[derive(Debug, Clone, Default)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    /// Empty when the cart is empty.
    pub subtotal: String,
    pub item_count: u32,
}

impl From<&LocalCart> for CartView {
    fn from(cart: &LocalCart) -> Self {
        Self {
            lines: cart.lines.iter().map(CartLineView::from).collect(),
            subtotal: cart.subtotal().map(|p| p.display()).unwrap_or_default(),
            item_count: cart.total_quantity(),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub chrome: PageChrome,
    pub cart: CartView,
}

/// Cart items fragment template (HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Inline add-to-cart error (HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_error.html")]
pub struct CartErrorTemplate {
    pub message: String,
}

/// Cart count badge template (HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

// =============================================================================
// Forms
// =============================================================================

/// Form data for adding items to cart.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub handle: String,
    pub variant_id: String,
    pub quantity: Option<u32>,
    /// Empty string when buying once.
    #[serde(default)]
    pub selling_plan_id: Option<String>,
}

/// Form data for updating cart item quantity.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: String,
    pub quantity: u32,
}

/// Form data for removing items from cart.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: String,
}

// =============================================================================
// Helpers
// =============================================================================

/// Build the line to add from the product as the backend describes it.
///
/// Rejects unknown or sold out variants, unknown selling plans, and
/// subscription-only products bought without a plan.
fn build_line(
    product: &Product,
    variant_id: &str,
    quantity: u32,
    selling_plan_id: Option<String>,
) -> Result<LocalCartLine, String> {
    let variant = product
        .variant(variant_id)
        .ok_or_else(|| "That option is no longer available".to_string())?;
    if !variant.available_for_sale {
        return Err(format!("{} is sold out", product.title));
    }

    match selling_plan_id.as_deref() {
        Some(plan) if product.selling_plan(plan).is_none() => {
            return Err("That subscription option is no longer available".to_string());
        }
        None if product.requires_selling_plan => {
            return Err(format!("{} is only available as a subscription", product.title));
        }
        _ => {}
    }

    let unit_price = variant
        .price
        .to_price()
        .map_err(|_| "This product cannot be added right now".to_string())?;

    Ok(LocalCartLine {
        product_id: product.id.clone(),
        variant_id: variant.id.clone(),
        handle: product.handle.clone(),
        title: product.title.clone(),
        variant_title: variant.title.clone(),
        unit_price,
        quantity: quantity.clamp(1, MAX_LINE_QUANTITY),
        selling_plan_id,
        image_url: variant
            .image
            .as_ref()
            .or(product.featured_image.as_ref())
            .map(|i| i.url.clone()),
    })
}

/// Persist the cart and schedule its backend sync.
async fn commit(state: &AppState, session: &Session, cart: &LocalCart) {
    if let Err(e) = cart.save(session).await {
        tracing::error!(error = %e, "Failed to save cart to session");
        return;
    }
    state.cart_sync().schedule(cart).await;
}

/// Answer an add that could not be completed.
async fn reject_add(
    session: &Session,
    headers: &HeaderMap,
    handle: &str,
    message: String,
) -> Response {
    if is_htmx(headers) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            CartErrorTemplate { message },
        )
            .into_response();
    }
    Flash::error(message).set(session).await;
    Redirect::to(&format!("/products/{}", urlencoding::encode(handle))).into_response()
}

/// Answer an update or remove.
fn items_response(headers: &HeaderMap, cart: &LocalCart) -> Response {
    if is_htmx(headers) {
        (
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartItemsTemplate {
                cart: CartView::from(cart),
            },
        )
            .into_response()
    } else {
        Redirect::to("/cart").into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip(session, chrome))]
pub async fn show(session: Session, chrome: PageChrome) -> impl IntoResponse {
    let cart = LocalCart::load(&session).await;
    CartShowTemplate {
        chrome,
        cart: CartView::from(&cart),
    }
}

/// Add item to cart.
#[instrument(skip(state, session, headers), fields(handle = %form.handle))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let product = match state.storefront().get_product_by_handle(&form.handle).await {
        Ok(product) => product,
        Err(ShopifyError::NotFound(_)) => {
            return reject_add(&session, &headers, &form.handle, "Product not found".to_string())
                .await;
        }
        Err(e) => {
            warn!(error = %e, "Product lookup failed during add to cart");
            return reject_add(
                &session,
                &headers,
                &form.handle,
                "We couldn't add that item right now. Please try again.".to_string(),
            )
            .await;
        }
    };

    let selling_plan_id = form.selling_plan_id.filter(|id| !id.trim().is_empty());
    let line = match build_line(
        &product,
        &form.variant_id,
        form.quantity.unwrap_or(1),
        selling_plan_id,
    ) {
        Ok(line) => line,
        Err(message) => return reject_add(&session, &headers, &form.handle, message).await,
    };

    add_breadcrumb("cart", "Added to cart", Some(&[("variant_id", line.variant_id.as_str())]));
    let title = line.title.clone();

    let mut cart = LocalCart::load(&session).await;
    cart.add(line);
    commit(&state, &session, &cart).await;
    info!(token = %cart.token, revision = cart.revision, "Cart line added");

    if is_htmx(&headers) {
        (
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartCountTemplate {
                count: cart.total_quantity(),
            },
        )
            .into_response()
    } else {
        Flash::success(format!("Added {title} to your cart"))
            .set(&session)
            .await;
        Redirect::to("/cart").into_response()
    }
}

/// Set a line's quantity; zero removes it.
#[instrument(skip(state, session, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Response {
    let mut cart = LocalCart::load(&session).await;
    let quantity = form.quantity.min(MAX_LINE_QUANTITY);
    let before = cart.revision;

    if cart.set_quantity(&form.product_id, quantity) && cart.revision != before {
        commit(&state, &session, &cart).await;
    }
    items_response(&headers, &cart)
}

/// Remove a line.
#[instrument(skip(state, session, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Response {
    let mut cart = LocalCart::load(&session).await;
    if cart.remove(&form.product_id) {
        commit(&state, &session, &cart).await;
    }
    items_response(&headers, &cart)
}

/// Get cart count badge (HTMX).
pub async fn count(session: Session) -> impl IntoResponse {
    let cart = LocalCart::load(&session).await;
    CartCountTemplate {
        count: cart.total_quantity(),
    }
}

/// Push the cart now and hand off to the backend's hosted checkout.
#[instrument(skip(state, session))]
pub async fn checkout(State(state): State<AppState>, session: Session) -> Response {
    let cart = LocalCart::load(&session).await;
    if cart.is_empty() {
        return Redirect::to("/cart").into_response();
    }

    let sync = state.cart_sync().flush(&cart).await;
    match (sync.last_error, sync.checkout_url) {
        (None, Some(url)) => {
            add_breadcrumb("cart", "Checkout started", None);
            Redirect::to(&url).into_response()
        }
        (error, _) => {
            warn!(error = ?error, "Checkout unavailable, cart not synced");
            Flash::error("Checkout is unavailable right now. Please try again in a moment.")
                .set(&session)
                .await;
            Redirect::to("/cart").into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::shopify::{Money, ProductVariant, SellingPlan, SellingPlanGroup};

    fn product(requires_plan: bool) -> Product {
        Product {
            id: "gid://shopify/Product/7".to_string(),
            handle: "coffee".to_string(),
            title: "House Coffee".to_string(),
            requires_selling_plan: requires_plan,
            variants: vec![
                ProductVariant {
                    id: "V1".to_string(),
                    title: "Default Title".to_string(),
                    available_for_sale: true,
                    quantity_available: None,
                    sku: None,
                    price: Money {
                        amount: "14.50".to_string(),
                        currency_code: "USD".to_string(),
                    },
                    compare_at_price: None,
                    selected_options: Vec::new(),
                    image: None,
                },
                ProductVariant {
                    id: "V2".to_string(),
                    title: "Decaf".to_string(),
                    available_for_sale: false,
                    quantity_available: Some(0),
                    sku: None,
                    price: Money {
                        amount: "15.00".to_string(),
                        currency_code: "USD".to_string(),
                    },
                    compare_at_price: None,
                    selected_options: Vec::new(),
                    image: None,
                },
            ],
            selling_plan_groups: vec![SellingPlanGroup {
                name: "Delivery".to_string(),
                selling_plans: vec![SellingPlan {
                    id: "SP1".to_string(),
                    name: "Every month".to_string(),
                    description: None,
                    price_adjustments: Vec::new(),
                    recurring_deliveries: true,
                }],
            }],
            ..Product::default()
        }
    }

    #[test]
    fn test_build_line_from_product() {
        let line = build_line(&product(false), "V1", 250, None).unwrap();
        assert_eq!(line.product_id, "gid://shopify/Product/7");
        assert_eq!(line.quantity, MAX_LINE_QUANTITY);
        assert_eq!(line.unit_price.display(), "$14.50");
        assert!(CartLineView::from(&line).variant_title.is_empty());
    }

    #[test]
    fn test_build_line_rejects_bad_input() {
        assert!(build_line(&product(false), "nope", 1, None).is_err());
        assert!(build_line(&product(false), "V2", 1, None).is_err());
        assert!(build_line(&product(false), "V1", 1, Some("SP9".to_string())).is_err());
    }

    #[test]
    fn test_subscription_only_product_needs_plan() {
        let err = build_line(&product(true), "V1", 1, None).unwrap_err();
        assert!(err.contains("only available as a subscription"));

        let line = build_line(&product(true), "V1", 1, Some("SP1".to_string())).unwrap();
        assert_eq!(line.selling_plan_id.as_deref(), Some("SP1"));
        assert!(CartLineView::from(&line).subscription);
    }

    #[test]
    fn test_cart_view_totals() {
        let mut cart = LocalCart::new();
        cart.add(build_line(&product(false), "V1", 2, None).unwrap());
        let view = CartView::from(&cart);
        assert_eq!(view.item_count, 2);
        assert_eq!(view.subtotal, "$29.00");
        assert_eq!(view.lines[0].line_total, "$29.00");
    }
}

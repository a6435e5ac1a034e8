//! Domain types for the commerce backend.
//!
//! These are the view models handlers and templates work with. The raw wire
//! shapes live in `storefront::queries` and are converted into these.

use larder_core::{Price, PriceError};
use serde::{Deserialize, Serialize};

// =============================================================================
// Money Types
// =============================================================================

/// Monetary amount with currency code, as the backend reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Decimal amount as string (preserves precision).
    pub amount: String,
    /// ISO 4217 currency code.
    pub currency_code: String,
}

impl Money {
    /// Parse into a typed [`Price`].
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not a decimal or the currency is unsupported.
    pub fn to_price(&self) -> Result<Price, PriceError> {
        Price::parse(&self.amount, &self.currency_code)
    }

    /// Formatted for display (`$19.99`), falling back to the raw amount.
    #[must_use]
    pub fn display(&self) -> String {
        self.to_price().map_or_else(
            |_| format!("{} {}", self.amount, self.currency_code),
            |price| price.display(),
        )
    }
}

/// Price range for a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceRange {
    pub min_variant_price: Money,
    pub max_variant_price: Money,
}

impl PriceRange {
    /// Whether all variants cost the same.
    #[must_use]
    pub fn is_single_price(&self) -> bool {
        self.min_variant_price == self.max_variant_price
    }
}

// =============================================================================
// Image Types
// =============================================================================

/// Product, variant or collection image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: Option<String>,
    pub url: String,
    pub alt_text: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

// =============================================================================
// Rating Types
// =============================================================================

/// Aggregate rating the reviews app writes into product metafields.
///
/// Only used for badges on product cards; the product page asks the reviews
/// service directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRating {
    pub value: f64,
    pub scale_max: f64,
    pub count: i64,
}

// =============================================================================
// Selling Plan Types (Subscriptions)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SellingPlanPriceAdjustmentValue {
    /// Percentage discount (15.0 for 15% off).
    Percentage(f64),
    /// Fixed amount off.
    FixedAmount(Money),
    /// Fixed price replacing the variant price.
    FixedPrice(Money),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellingPlanPriceAdjustment {
    pub adjustment_value: SellingPlanPriceAdjustmentValue,
    /// Number of orders the adjustment applies to (`None` = every order).
    pub order_count: Option<i64>,
}

/// A single subscription option a variant can be bought with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellingPlan {
    /// Selling plan ID (passed to the cart line).
    pub id: String,
    /// Display name ("Deliver every 30 days").
    pub name: String,
    pub description: Option<String>,
    pub price_adjustments: Vec<SellingPlanPriceAdjustment>,
    pub recurring_deliveries: bool,
}

impl SellingPlan {
    /// Percentage saved on the first adjustment, if it is a percentage.
    #[must_use]
    pub fn discount_percentage(&self) -> Option<f64> {
        match self.price_adjustments.first()?.adjustment_value {
            SellingPlanPriceAdjustmentValue::Percentage(pct) => Some(pct),
            _ => None,
        }
    }
}

/// A group of selling plans ("Subscribe & Save").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellingPlanGroup {
    pub name: String,
    pub selling_plans: Vec<SellingPlan>,
}

// =============================================================================
// Product Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedOption {
    pub name: String,
    pub value: String,
}

/// A product option such as "Size" with its values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductOption {
    pub name: String,
    pub values: Vec<String>,
}

/// A purchasable variant of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: String,
    pub title: String,
    pub available_for_sale: bool,
    /// Units in stock, when the backend exposes inventory for this variant.
    pub quantity_available: Option<i64>,
    pub sku: Option<String>,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    pub selected_options: Vec<SelectedOption>,
    pub image: Option<Image>,
}

impl ProductVariant {
    /// Whether the variant is discounted against its compare-at price.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        let (Some(compare_at), Ok(price)) = (&self.compare_at_price, self.price.to_price()) else {
            return false;
        };
        compare_at
            .to_price()
            .is_ok_and(|compare_at| compare_at.amount > price.amount)
    }
}

/// A product as shown on listing cards and the detail page.
///
/// Listing queries leave `images`, `options`, `variants` and
/// `selling_plan_groups` empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Product {
    /// Global ID (`gid://shopify/Product/123`).
    pub id: String,
    pub handle: String,
    pub title: String,
    pub description: String,
    pub description_html: String,
    pub available_for_sale: bool,
    pub product_type: String,
    pub vendor: String,
    pub tags: Vec<String>,
    pub price_range: PriceRange,
    pub featured_image: Option<Image>,
    pub images: Vec<Image>,
    pub options: Vec<ProductOption>,
    pub variants: Vec<ProductVariant>,
    pub selling_plan_groups: Vec<SellingPlanGroup>,
    /// Subscription-only product.
    pub requires_selling_plan: bool,
    pub rating: Option<ProductRating>,
}

impl Product {
    /// Trailing numeric part of the global ID.
    #[must_use]
    pub fn numeric_id(&self) -> Option<&str> {
        numeric_id(&self.id)
    }

    /// First variant that can be bought, or the first variant at all.
    #[must_use]
    pub fn default_variant(&self) -> Option<&ProductVariant> {
        self.variants
            .iter()
            .find(|v| v.available_for_sale)
            .or_else(|| self.variants.first())
    }

    #[must_use]
    pub fn variant(&self, variant_id: &str) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// Look up a selling plan by ID across all groups.
    #[must_use]
    pub fn selling_plan(&self, plan_id: &str) -> Option<&SellingPlan> {
        self.selling_plan_groups
            .iter()
            .flat_map(|g| &g.selling_plans)
            .find(|p| p.id == plan_id)
    }

    #[must_use]
    pub fn has_subscription(&self) -> bool {
        self.selling_plan_groups
            .iter()
            .any(|g| !g.selling_plans.is_empty())
    }
}

/// Strip a global ID (`gid://shopify/Product/123`) down to its numeric part.
#[must_use]
pub fn numeric_id(gid: &str) -> Option<&str> {
    let tail = gid.rsplit('/').next()?;
    let tail = tail.split('?').next().unwrap_or(tail);
    (!tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit())).then_some(tail)
}

// =============================================================================
// Collection Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub handle: String,
    pub title: String,
    pub description: String,
    pub image: Option<Image>,
    /// Products on the requested page (empty for collection listings).
    pub products: Vec<Product>,
    pub products_page_info: PageInfo,
}

// =============================================================================
// Pagination Types
// =============================================================================

/// Cursor pagination state of a connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConnection {
    pub products: Vec<Product>,
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConnection {
    pub collections: Vec<Collection>,
    pub page_info: PageInfo,
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductSortKey {
    #[default]
    BestSelling,
    CreatedAt,
    Price,
    Relevance,
    Title,
}

// =============================================================================
// Inventory Types
// =============================================================================

/// Stock information for one variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantInventory {
    pub variant_id: String,
    pub product_handle: Option<String>,
    pub available_for_sale: bool,
    /// Sold out but still purchasable (backorder).
    pub currently_not_in_stock: bool,
    pub quantity_available: Option<i64>,
}

// =============================================================================
// Cart Types
// =============================================================================

/// Product information on a cart line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartMerchandiseProduct {
    pub id: String,
    pub handle: String,
    pub title: String,
}

/// The variant a cart line refers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartMerchandise {
    /// Variant ID.
    pub id: String,
    /// Variant title ("Default Title" for single-variant products).
    pub title: String,
    pub image: Option<Image>,
    pub product: CartMerchandiseProduct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineCost {
    pub amount_per_quantity: Money,
    pub total_amount: Money,
}

/// A line on the backend cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    /// Cart line ID (needed for updates and removals).
    pub id: String,
    pub quantity: i64,
    pub cost: CartLineCost,
    pub merchandise: CartMerchandise,
    pub selling_plan_id: Option<String>,
    pub selling_plan_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartCost {
    pub subtotal_amount: Money,
    pub total_amount: Money,
    pub total_tax_amount: Option<Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartDiscountCode {
    pub code: String,
    pub applicable: bool,
}

/// A cart as stored by the commerce backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: String,
    /// Hosted checkout page for this cart.
    pub checkout_url: String,
    pub total_quantity: i64,
    pub note: Option<String>,
    pub cost: CartCost,
    pub discount_codes: Vec<CartDiscountCode>,
    pub lines: Vec<CartLine>,
}

/// Input for adding a line to a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineInput {
    /// Variant ID.
    pub merchandise_id: String,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selling_plan_id: Option<String>,
}

/// Input for updating an existing cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineUpdateInput {
    /// Cart line ID.
    pub id: String,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchandise_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selling_plan_id: Option<String>,
}

/// Validation error returned by a cart or customer mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserError {
    pub code: Option<String>,
    pub field: Option<Vec<String>>,
    pub message: String,
}

// =============================================================================
// Customer Types
// =============================================================================

/// Access token issued by `customerAccessTokenCreate`.
#[derive(Clone, Serialize, Deserialize)]
pub struct CustomerAccessToken {
    pub access_token: String,
    /// RFC 3339 expiry timestamp.
    pub expires_at: String,
}

impl std::fmt::Debug for CustomerAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomerAccessToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

impl Address {
    /// Non-empty address lines, in postal order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let locality = [
            self.city.as_deref(),
            self.province.as_deref(),
            self.zip.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");

        [
            Some(name),
            self.address1.clone(),
            self.address2.clone(),
            Some(locality),
            self.country.clone(),
        ]
        .into_iter()
        .flatten()
        .filter(|line| !line.trim().is_empty())
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub title: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Display name (`#1001`).
    pub name: String,
    pub processed_at: String,
    pub financial_status: Option<String>,
    pub fulfillment_status: String,
    pub status_url: String,
    pub total_price: Money,
    pub line_items: Vec<OrderLineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub default_address: Option<Address>,
    pub addresses: Vec<Address>,
    pub orders: Vec<Order>,
}

impl Customer {
    /// Name to greet the customer with.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.email.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn money(amount: &str) -> Money {
        Money {
            amount: amount.to_string(),
            currency_code: "USD".to_string(),
        }
    }

    #[test]
    fn test_money_display() {
        assert_eq!(money("19.9").display(), "$19.90");
        assert_eq!(money("abc").display(), "abc USD");
    }

    #[test]
    fn test_numeric_id() {
        assert_eq!(numeric_id("gid://shopify/Product/8123"), Some("8123"));
        assert_eq!(
            numeric_id("gid://shopify/ProductVariant/42?foo=bar"),
            Some("42")
        );
        assert_eq!(numeric_id("gid://shopify/Cart/abc"), None);
        assert_eq!(numeric_id(""), None);
    }

    #[test]
    fn test_variant_on_sale() {
        let mut variant = ProductVariant {
            id: "v1".to_string(),
            title: "Default".to_string(),
            available_for_sale: true,
            quantity_available: Some(3),
            sku: None,
            price: money("8.00"),
            compare_at_price: Some(money("10.00")),
            selected_options: vec![],
            image: None,
        };
        assert!(variant.is_on_sale());

        variant.compare_at_price = Some(money("8.00"));
        assert!(!variant.is_on_sale());

        variant.compare_at_price = None;
        assert!(!variant.is_on_sale());
    }

    #[test]
    fn test_address_lines_skip_blanks() {
        let address = Address {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            address1: Some("12 Pantry Lane".to_string()),
            city: Some("Portland".to_string()),
            province: Some("OR".to_string()),
            zip: Some("97201".to_string()),
            country: Some("United States".to_string()),
            ..Address::default()
        };
        assert_eq!(
            address.lines(),
            vec![
                "Ada Lovelace",
                "12 Pantry Lane",
                "Portland, OR, 97201",
                "United States"
            ]
        );
    }

    #[test]
    fn test_line_input_wire_shape() {
        let input = CartLineInput {
            merchandise_id: "gid://shopify/ProductVariant/1".to_string(),
            quantity: 2,
            selling_plan_id: None,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"merchandiseId": "gid://shopify/ProductVariant/1", "quantity": 2})
        );
    }

    #[test]
    fn test_customer_token_debug_redacted() {
        let token = CustomerAccessToken {
            access_token: "shpat_secret".to_string(),
            expires_at: "2026-12-01T00:00:00Z".to_string(),
        };
        assert!(!format!("{token:?}").contains("shpat_secret"));
    }
}

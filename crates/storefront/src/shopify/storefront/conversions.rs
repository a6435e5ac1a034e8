//! Wire shapes to domain types.

use serde::Deserialize;

use super::queries::{
    CartFields, CollectionSummaryFields, Connection, ImageFields, MetafieldValue, MoneyFields,
    PageInfoFields, PriceRangeFields, ProductCardFields, UserErrorFields, get_collection_by_handle,
    get_customer, get_product_by_handle, get_variant_inventory,
};
use crate::shopify::types::{
    Address, Cart, CartCost, CartDiscountCode, CartLine, CartLineCost, CartMerchandise,
    CartMerchandiseProduct, Collection, CollectionConnection, Customer, Image, Money, Order,
    OrderLineItem, PageInfo, PriceRange, Product, ProductConnection, ProductOption, ProductRating,
    ProductVariant, SelectedOption, SellingPlan, SellingPlanGroup, SellingPlanPriceAdjustment,
    SellingPlanPriceAdjustmentValue, UserError, VariantInventory,
};

// =============================================================================
// Shared
// =============================================================================

fn convert_money(m: MoneyFields) -> Money {
    Money {
        amount: m.amount,
        currency_code: m.currency_code,
    }
}

fn convert_image(i: ImageFields) -> Image {
    Image {
        id: i.id,
        url: i.url,
        alt_text: i.alt_text,
        width: i.width,
        height: i.height,
    }
}

fn convert_price_range(r: PriceRangeFields) -> PriceRange {
    PriceRange {
        min_variant_price: convert_money(r.min_variant_price),
        max_variant_price: convert_money(r.max_variant_price),
    }
}

fn convert_page_info(p: PageInfoFields) -> PageInfo {
    PageInfo {
        has_next_page: p.has_next_page,
        has_previous_page: p.has_previous_page,
        start_cursor: p.start_cursor,
        end_cursor: p.end_cursor,
    }
}

pub fn convert_user_errors(errors: Vec<UserErrorFields>) -> Vec<UserError> {
    errors
        .into_iter()
        .map(|e| UserError {
            code: e.code,
            field: e.field,
            message: e.message,
        })
        .collect()
}

// =============================================================================
// Products
// =============================================================================

/// Rating metafield JSON: `{"value": "4.3", "scale_min": "1.0", "scale_max": "5.0"}`.
#[derive(Deserialize)]
struct RatingMetafield {
    value: String,
    scale_max: String,
}

fn parse_rating(
    rating: Option<MetafieldValue>,
    rating_count: Option<MetafieldValue>,
) -> Option<ProductRating> {
    let count: i64 = rating_count?.value.trim().parse().ok()?;
    if count == 0 {
        return None;
    }
    let parsed: RatingMetafield = serde_json::from_str(&rating?.value).ok()?;

    Some(ProductRating {
        value: parsed.value.parse().ok()?,
        scale_max: parsed.scale_max.parse().ok()?,
        count,
    })
}

/// Convert a listing card; detail-only fields are left empty.
pub fn convert_product_card(p: ProductCardFields) -> Product {
    Product {
        id: p.id,
        handle: p.handle,
        title: p.title,
        description: p.description,
        description_html: String::new(),
        available_for_sale: p.available_for_sale,
        product_type: p.product_type,
        vendor: p.vendor,
        tags: p.tags,
        price_range: convert_price_range(p.price_range),
        featured_image: p.featured_image.map(convert_image),
        images: Vec::new(),
        options: Vec::new(),
        variants: Vec::new(),
        selling_plan_groups: Vec::new(),
        requires_selling_plan: false,
        rating: parse_rating(p.rating, p.rating_count),
    }
}

pub fn convert_product(p: get_product_by_handle::ProductDetail) -> Product {
    let get_product_by_handle::ProductDetail {
        card,
        description_html,
        requires_selling_plan,
        images,
        options,
        variants,
        selling_plan_groups,
    } = p;

    Product {
        description_html,
        requires_selling_plan,
        images: images.into_nodes().map(convert_image).collect(),
        options: options
            .into_iter()
            .map(|o| ProductOption {
                name: o.name,
                values: o.option_values.into_iter().map(|v| v.name).collect(),
            })
            .collect(),
        variants: variants.into_nodes().map(convert_variant).collect(),
        selling_plan_groups: selling_plan_groups
            .into_nodes()
            .map(|g| SellingPlanGroup {
                name: g.name,
                selling_plans: g.selling_plans.into_nodes().map(convert_selling_plan).collect(),
            })
            .collect(),
        ..convert_product_card(card)
    }
}

fn convert_variant(v: get_product_by_handle::VariantFields) -> ProductVariant {
    ProductVariant {
        id: v.id,
        title: v.title,
        available_for_sale: v.available_for_sale,
        quantity_available: v.quantity_available,
        sku: v.sku.filter(|s| !s.is_empty()),
        price: convert_money(v.price),
        compare_at_price: v.compare_at_price.map(convert_money),
        selected_options: v
            .selected_options
            .into_iter()
            .map(|o| SelectedOption {
                name: o.name,
                value: o.value,
            })
            .collect(),
        image: v.image.map(convert_image),
    }
}

fn convert_selling_plan(plan: get_product_by_handle::SellingPlanFields) -> SellingPlan {
    use get_product_by_handle::AdjustmentValue;

    SellingPlan {
        id: plan.id,
        name: plan.name,
        description: plan.description,
        recurring_deliveries: plan.recurring_deliveries,
        price_adjustments: plan
            .price_adjustments
            .into_iter()
            .filter_map(|adj| {
                let adjustment_value = match adj.adjustment_value {
                    AdjustmentValue::SellingPlanPercentagePriceAdjustment {
                        adjustment_percentage,
                    } => SellingPlanPriceAdjustmentValue::Percentage(adjustment_percentage),
                    AdjustmentValue::SellingPlanFixedAmountPriceAdjustment {
                        adjustment_amount,
                    } => SellingPlanPriceAdjustmentValue::FixedAmount(convert_money(
                        adjustment_amount,
                    )),
                    AdjustmentValue::SellingPlanFixedPriceAdjustment { price } => {
                        SellingPlanPriceAdjustmentValue::FixedPrice(convert_money(price))
                    }
                    AdjustmentValue::Unknown => return None,
                };
                Some(SellingPlanPriceAdjustment {
                    adjustment_value,
                    order_count: adj.order_count,
                })
            })
            .collect(),
    }
}

pub fn convert_product_connection(conn: Connection<ProductCardFields>) -> ProductConnection {
    ProductConnection {
        products: conn
            .edges
            .into_iter()
            .map(|e| convert_product_card(e.node))
            .collect(),
        page_info: convert_page_info(conn.page_info),
    }
}

// =============================================================================
// Collections
// =============================================================================

fn convert_collection_summary(c: CollectionSummaryFields) -> Collection {
    Collection {
        id: c.id,
        handle: c.handle,
        title: c.title,
        description: c.description,
        image: c.image.map(convert_image),
        products: Vec::new(),
        products_page_info: PageInfo::default(),
    }
}

pub fn convert_collection(c: get_collection_by_handle::CollectionDetail) -> Collection {
    let products = convert_product_connection(c.products);
    Collection {
        products: products.products,
        products_page_info: products.page_info,
        ..convert_collection_summary(c.summary)
    }
}

pub fn convert_collection_connection(
    conn: Connection<CollectionSummaryFields>,
) -> CollectionConnection {
    CollectionConnection {
        collections: conn
            .edges
            .into_iter()
            .map(|e| convert_collection_summary(e.node))
            .collect(),
        page_info: convert_page_info(conn.page_info),
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Keep only nodes that resolved to variants.
pub fn convert_inventory(
    nodes: Vec<Option<get_variant_inventory::InventoryNode>>,
) -> Vec<VariantInventory> {
    nodes
        .into_iter()
        .flatten()
        .filter_map(|node| {
            Some(VariantInventory {
                variant_id: node.id?,
                product_handle: node.product.map(|p| p.handle),
                available_for_sale: node.available_for_sale.unwrap_or(false),
                currently_not_in_stock: node.currently_not_in_stock.unwrap_or(false),
                quantity_available: node.quantity_available,
            })
        })
        .collect()
}

// =============================================================================
// Cart
// =============================================================================

pub fn convert_cart(cart: CartFields) -> Cart {
    Cart {
        id: cart.id,
        checkout_url: cart.checkout_url,
        total_quantity: cart.total_quantity,
        note: cart.note,
        cost: CartCost {
            subtotal_amount: convert_money(cart.cost.subtotal_amount),
            total_amount: convert_money(cart.cost.total_amount),
            total_tax_amount: cart.cost.total_tax_amount.map(convert_money),
        },
        discount_codes: cart
            .discount_codes
            .into_iter()
            .map(|d| CartDiscountCode {
                code: d.code,
                applicable: d.applicable,
            })
            .collect(),
        lines: cart
            .lines
            .into_nodes()
            .map(|line| {
                let (selling_plan_id, selling_plan_name) = line
                    .selling_plan_allocation
                    .map(|a| (a.selling_plan.id, a.selling_plan.name))
                    .unzip();
                CartLine {
                    id: line.id,
                    quantity: line.quantity,
                    cost: CartLineCost {
                        amount_per_quantity: convert_money(line.cost.amount_per_quantity),
                        total_amount: convert_money(line.cost.total_amount),
                    },
                    merchandise: CartMerchandise {
                        id: line.merchandise.id,
                        title: line.merchandise.title,
                        image: line.merchandise.image.map(convert_image),
                        product: CartMerchandiseProduct {
                            id: line.merchandise.product.id,
                            handle: line.merchandise.product.handle,
                            title: line.merchandise.product.title,
                        },
                    },
                    selling_plan_id,
                    selling_plan_name,
                }
            })
            .collect(),
    }
}

// =============================================================================
// Customer
// =============================================================================

fn convert_address(a: get_customer::AddressFields) -> Address {
    Address {
        id: a.id,
        first_name: a.first_name,
        last_name: a.last_name,
        address1: a.address1,
        address2: a.address2,
        city: a.city,
        province: a.province,
        zip: a.zip,
        country: a.country,
        phone: a.phone,
    }
}

pub fn convert_customer(c: get_customer::CustomerFields) -> Customer {
    Customer {
        id: c.id,
        first_name: c.first_name,
        last_name: c.last_name,
        email: c.email,
        phone: c.phone,
        default_address: c.default_address.map(convert_address),
        addresses: c.addresses.into_nodes().map(convert_address).collect(),
        orders: c
            .orders
            .into_nodes()
            .map(|o| Order {
                id: o.id,
                name: o.name,
                processed_at: o.processed_at,
                financial_status: o.financial_status,
                fulfillment_status: o.fulfillment_status,
                status_url: o.status_url,
                total_price: convert_money(o.total_price),
                line_items: o
                    .line_items
                    .into_nodes()
                    .map(|li| OrderLineItem {
                        title: li.title,
                        quantity: li.quantity,
                    })
                    .collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn metafield(value: &str) -> Option<MetafieldValue> {
        Some(MetafieldValue {
            value: value.to_string(),
        })
    }

    #[test]
    fn test_parse_rating() {
        let rating = parse_rating(
            metafield(r#"{"value":"4.6","scale_min":"1.0","scale_max":"5.0"}"#),
            metafield("12"),
        )
        .unwrap();
        assert!((rating.value - 4.6).abs() < f64::EPSILON);
        assert_eq!(rating.count, 12);
    }

    #[test]
    fn test_parse_rating_zero_count_is_none() {
        assert!(
            parse_rating(
                metafield(r#"{"value":"0","scale_min":"1.0","scale_max":"5.0"}"#),
                metafield("0"),
            )
            .is_none()
        );
        assert!(parse_rating(None, metafield("3")).is_none());
    }

    #[test]
    fn test_convert_cart_from_wire() {
        let json = serde_json::json!({
            "id": "gid://shopify/Cart/c1",
            "checkoutUrl": "https://shop.example/checkouts/c1",
            "totalQuantity": 2,
            "note": null,
            "cost": {
                "subtotalAmount": {"amount": "10.0", "currencyCode": "USD"},
                "totalAmount": {"amount": "10.0", "currencyCode": "USD"},
                "totalTaxAmount": null
            },
            "discountCodes": [],
            "lines": {"edges": [{"node": {
                "id": "gid://shopify/CartLine/l1",
                "quantity": 2,
                "cost": {
                    "amountPerQuantity": {"amount": "5.0", "currencyCode": "USD"},
                    "totalAmount": {"amount": "10.0", "currencyCode": "USD"}
                },
                "merchandise": {
                    "id": "gid://shopify/ProductVariant/v1",
                    "title": "1 kg",
                    "image": null,
                    "product": {"id": "gid://shopify/Product/p1", "handle": "rye", "title": "Rye"}
                },
                "sellingPlanAllocation": {"sellingPlan": {"id": "sp1", "name": "Monthly"}}
            }}]}
        });
        let cart = convert_cart(serde_json::from_value(json).unwrap());
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].merchandise.product.handle, "rye");
        assert_eq!(cart.lines[0].selling_plan_id.as_deref(), Some("sp1"));
        assert_eq!(cart.cost.subtotal_amount.display(), "$10.00");
    }

    #[test]
    fn test_convert_inventory_drops_non_variants() {
        let data: get_variant_inventory::ResponseData = serde_json::from_value(serde_json::json!({
            "nodes": [
                {"id": "v1", "availableForSale": true, "currentlyNotInStock": false,
                 "quantityAvailable": 4, "product": {"handle": "rye"}},
                {},
                null
            ]
        }))
        .unwrap();
        let inventory = convert_inventory(data.nodes);
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].quantity_available, Some(4));
        assert_eq!(inventory[0].product_handle.as_deref(), Some("rye"));
    }
}

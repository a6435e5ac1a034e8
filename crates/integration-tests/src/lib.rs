//! Integration tests for the Larder storefront.
//!
//! Every vendor (commerce backend, CMS, reviews, billing) is replaced by one
//! `wiremock` server, and requests are driven through the full router with
//! `tower::ServiceExt::oneshot`. No network access or credentials needed.
//!
//! ```bash
//! cargo test -p larder-integration-tests
//! ```
//!
//! Vendor paths on the mock server:
//!
//! - `/graphql` - commerce backend Storefront API
//! - `/cms/...` - headless CMS
//! - `/reviews-api/...` - reviews service
//! - `/billing/...` and `/oauth/token` - subscription billing

#![allow(clippy::missing_panics_doc, clippy::unwrap_used, clippy::expect_used)]

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use larder_storefront::config::{
    BillingConfig, CartConfig, CmsConfig, ReviewsConfig, ShopifyStorefrontConfig,
    StorefrontConfig,
};
use larder_storefront::content::ContentStore;
use larder_storefront::routes;
use larder_storefront::state::AppState;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Debounce used in tests; short enough to wait out.
pub const TEST_DEBOUNCE: Duration = Duration::from_millis(50);

/// Configuration pointing every vendor at `server_uri`.
#[must_use]
pub fn test_config(server_uri: &str) -> StorefrontConfig {
    StorefrontConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        shopify: ShopifyStorefrontConfig {
            store: "larder-test.myshopify.com".to_string(),
            api_version: "2026-01".to_string(),
            storefront_private_token: SecretString::from("shpat_test_token_0123456789"),
            endpoint_override: Some(format!("{server_uri}/graphql")),
        },
        cms: CmsConfig {
            api_url: format!("{server_uri}/cms"),
            api_token: SecretString::from("cms_test_token"),
        },
        reviews: ReviewsConfig {
            api_url: format!("{server_uri}/reviews-api"),
            api_token: SecretString::from("reviews_test_token"),
            shop_domain: "larder-test.myshopify.com".to_string(),
        },
        billing: BillingConfig {
            api_url: format!("{server_uri}/billing"),
            token_url: format!("{server_uri}/oauth/token"),
            client_id: "larder-storefront".to_string(),
            client_secret: SecretString::from("billing_test_secret"),
            scope: None,
        },
        cart: CartConfig {
            sync_debounce: TEST_DEBOUNCE,
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Full application router with middleware, backed by the mock server.
#[must_use]
pub fn test_app(server_uri: &str) -> Router {
    routes::app(AppState::new(test_config(server_uri), ContentStore::default()))
}

/// Send one request through the router.
pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

#[must_use]
pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri).header("x-forwarded-for", "203.0.113.7");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// Form post, optionally as an HTMX request.
#[must_use]
pub fn post_form(uri: &str, form: &str, cookie: Option<&str>, htmx: bool) -> Request<Body> {
    let mut builder = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-forwarded-for", "203.0.113.7");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    if htmx {
        builder = builder.header("hx-request", "true");
    }
    builder.body(Body::from(form.to_string())).unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `name=value` of the session cookie set by a response, for replaying.
#[must_use]
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("larder_session="))
        .and_then(|v| v.split(';').next())
        .map(String::from)
}

// =============================================================================
// Vendor fixtures
// =============================================================================

fn money(amount: &str) -> Value {
    json!({ "amount": amount, "currencyCode": "USD" })
}

/// `GetProductByHandle` response for a one-variant product.
#[must_use]
pub fn product_response(handle: &str, requires_selling_plan: bool) -> Value {
    json!({
        "data": {
            "product": {
                "id": "gid://shopify/Product/1001",
                "handle": handle,
                "title": "Stone-Ground Rye Flour",
                "description": "Whole grain rye.",
                "descriptionHtml": "<p>Whole grain rye.</p>",
                "availableForSale": true,
                "productType": "Flour",
                "vendor": "Larder Mill",
                "tags": ["rye", "baking"],
                "priceRange": {
                    "minVariantPrice": money("9.50"),
                    "maxVariantPrice": money("9.50")
                },
                "featuredImage": null,
                "rating": null,
                "ratingCount": null,
                "requiresSellingPlan": requires_selling_plan,
                "images": { "edges": [] },
                "options": [],
                "variants": { "edges": [{ "node": {
                    "id": "gid://shopify/ProductVariant/2002",
                    "title": "Default Title",
                    "availableForSale": true,
                    "quantityAvailable": 12,
                    "sku": "RYE-1KG",
                    "price": money("9.50"),
                    "compareAtPrice": null,
                    "selectedOptions": [],
                    "image": null
                }}]},
                "sellingPlanGroups": { "edges": [] }
            }
        }
    })
}

/// `cartCreate` response mirroring `quantity` units of the fixture variant.
#[must_use]
pub fn cart_create_response(quantity: i64) -> Value {
    let total = format!("{:.2}", 9.5 * f64::from(i32::try_from(quantity).unwrap()));
    json!({
        "data": {
            "result": {
                "cart": {
                    "id": "gid://shopify/Cart/abc123",
                    "checkoutUrl": "https://larder-test.myshopify.com/cart/c/abc123",
                    "totalQuantity": quantity,
                    "note": null,
                    "cost": {
                        "subtotalAmount": money(&total),
                        "totalAmount": money(&total),
                        "totalTaxAmount": null
                    },
                    "discountCodes": [],
                    "lines": { "edges": [{ "node": {
                        "id": "gid://shopify/CartLine/1",
                        "quantity": quantity,
                        "cost": {
                            "amountPerQuantity": money("9.50"),
                            "totalAmount": money(&total)
                        },
                        "merchandise": {
                            "id": "gid://shopify/ProductVariant/2002",
                            "title": "Default Title",
                            "image": null,
                            "product": {
                                "id": "gid://shopify/Product/1001",
                                "handle": "rye-flour",
                                "title": "Stone-Ground Rye Flour"
                            }
                        },
                        "sellingPlanAllocation": null
                    }}]}
                },
                "userErrors": []
            }
        }
    })
}

/// A published CMS post.
#[must_use]
pub fn cms_post(slug: &str, published_at: &str, tags: &[&str]) -> Value {
    json!({
        "slug": slug,
        "title": format!("Recipe {slug}"),
        "excerpt": "A weeknight favourite.",
        "body": "Mix the flour.\n\nBake until golden.",
        "author": { "name": "Sam" },
        "published_at": published_at,
        "tags": tags,
        "status": "published"
    })
}

/// A review as the reviews service returns it.
#[must_use]
pub fn review(id: u64, rating: u8) -> Value {
    json!({
        "id": id,
        "title": "Great",
        "body": "Lovely flavour.",
        "rating": rating,
        "reviewer": { "name": "Alex" },
        "created_at": "2026-08-01T10:00:00Z",
        "hidden": false,
        "published": true,
        "verified": "buyer"
    })
}

/// A billing subscription record.
#[must_use]
pub fn subscription(id: u64, email: &str, status: &str) -> Value {
    json!({
        "id": id,
        "customer_email": email,
        "status": status,
        "plan_name": "Monthly coffee",
        "product_title": "House Coffee",
        "price": "18.00",
        "currency": "USD",
        "interval": "week",
        "interval_count": 2,
        "next_billing_at": "2026-11-02T00:00:00Z"
    })
}

//! Storefront API client against a mocked GraphQL endpoint.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use larder_integration_tests::{cart_create_response, product_response, test_config};
use larder_storefront::shopify::{ShopifyError, StorefrontClient};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> StorefrontClient {
    StorefrontClient::new(&test_config(&server.uri()).shopify)
}

#[tokio::test]
async fn test_product_by_handle_is_cached() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("Shopify-Storefront-Private-Token", "shpat_test_token_0123456789"))
        .and(body_partial_json(json!({
            "operationName": "GetProductByHandle",
            "variables": { "handle": "rye-flour" }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(product_response("rye-flour", false)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let product = client.get_product_by_handle("rye-flour").await.unwrap();
    assert_eq!(product.title, "Stone-Ground Rye Flour");
    assert_eq!(product.variants.len(), 1);
    assert!(!product.requires_selling_plan);

    client.get_product_by_handle("rye-flour").await.unwrap();
}

#[tokio::test]
async fn test_missing_product_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "product": null }
        })))
        .mount(&server)
        .await;

    let err = client(&server).get_product_by_handle("nope").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_graphql_errors_are_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "Throttled" }]
        })))
        .mount(&server)
        .await;

    let err = client(&server).get_products(8, None, None).await.unwrap_err();
    assert!(matches!(err, ShopifyError::GraphQL(ref errors) if errors[0].message == "Throttled"));
}

#[tokio::test]
async fn test_rate_limit_reports_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "4"))
        .mount(&server)
        .await;

    let err = client(&server).get_collections(6, None).await.unwrap_err();
    assert!(matches!(err, ShopifyError::RateLimited(4)));
}

#[tokio::test]
async fn test_discount_codes_update_cart() {
    let server = MockServer::start().await;

    let mut response = cart_create_response(1);
    response["data"]["result"]["cart"]["discountCodes"] =
        json!([{ "code": "WELCOME10", "applicable": true }]);

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "operationName": "UpdateCartDiscountCodes",
            "variables": { "cartId": "gid://shopify/Cart/abc123", "discountCodes": ["WELCOME10"] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .expect(1)
        .mount(&server)
        .await;

    let cart = client(&server)
        .update_discount_codes("gid://shopify/Cart/abc123", vec!["WELCOME10".to_string()])
        .await
        .unwrap();

    assert_eq!(cart.discount_codes.len(), 1);
    assert_eq!(cart.discount_codes[0].code, "WELCOME10");
}

#[tokio::test]
async fn test_cart_user_errors_become_user_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "operationName": "CreateCart" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "result": {
                    "cart": null,
                    "userErrors": [{
                        "code": "INVALID",
                        "field": ["input", "lines", "0"],
                        "message": "Merchandise is sold out"
                    }]
                }
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server).create_cart(Vec::new()).await.unwrap_err();
    assert!(matches!(err, ShopifyError::UserError(ref message) if message.contains("sold out")));
}

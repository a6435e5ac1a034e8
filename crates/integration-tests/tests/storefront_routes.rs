//! End-to-end requests through the storefront router with mocked vendors.

#![allow(clippy::unwrap_used)]

use axum::http::{StatusCode, header};
use larder_integration_tests::{
    body_string, cart_create_response, get, post_form, product_response, send, session_cookie,
    test_app,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADD_RYE: &str =
    "handle=rye-flour&variant_id=gid%3A%2F%2Fshopify%2FProductVariant%2F2002&quantity=2";

fn location(response: &axum::http::Response<axum::body::Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

async fn mount_product(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "operationName": "GetProductByHandle" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(product_response("rye-flour", false)),
        )
        .mount(server)
        .await;
}

/// The backend no longer knows any cart.
async fn mount_expired_cart(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "operationName": "GetCart" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "cart": null }
        })))
        .mount(server)
        .await;
}

/// Add the fixture product without HTMX and return the session cookie.
async fn add_to_cart(app: &axum::Router) -> String {
    let response = send(app, post_form("/cart/add", ADD_RYE, None, false)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/cart");
    session_cookie(&response).unwrap()
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start().await;
    let app = test_app(&server.uri());

    let response = send(&app, get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_unknown_path_renders_not_found_page() {
    let server = MockServer::start().await;
    let app = test_app(&server.uri());

    let response = send(&app, get("/no/such/page", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
}

#[tokio::test]
async fn test_security_headers_present() {
    let server = MockServer::start().await;
    let app = test_app(&server.uri());

    let response = send(&app, get("/health", None)).await;
    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert!(headers.contains_key("content-security-policy"));
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_product_page_survives_side_service_outages() {
    let server = MockServer::start().await;
    mount_product(&server).await;
    // Inventory, recommendations, reviews and CMS all fall through to 404s.

    let app = test_app(&server.uri());
    let response = send(&app, get("/products/rye-flour", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("Stone-Ground Rye Flour"));
    assert!(body.contains("$9.50"));
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

    let app = test_app(&server.uri());
    let response = send(&app, get("/products/nope", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_to_cart_updates_session_cart() {
    let server = MockServer::start().await;
    mount_product(&server).await;

    let app = test_app(&server.uri());
    let cookie = add_to_cart(&app).await;

    let response = send(&app, get("/api/cart", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cart: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(cart["total_quantity"], 2);
    assert_eq!(cart["lines"][0]["handle"], "rye-flour");
    assert_eq!(cart["subtotal"], "$19.00");
}

#[tokio::test]
async fn test_htmx_add_returns_count_fragment() {
    let server = MockServer::start().await;
    mount_product(&server).await;

    let app = test_app(&server.uri());
    let response = send(&app, post_form("/cart/add", ADD_RYE, None, true)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("hx-trigger").unwrap(), "cart-updated");
    assert!(body_string(response).await.contains('2'));
}

#[tokio::test]
async fn test_add_unknown_variant_is_rejected() {
    let server = MockServer::start().await;
    mount_product(&server).await;

    let app = test_app(&server.uri());
    let response = send(
        &app,
        post_form(
            "/cart/add",
            "handle=rye-flour&variant_id=gid%3A%2F%2Fshopify%2FProductVariant%2F9",
            None,
            true,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_cart_syncs_after_debounce() {
    let server = MockServer::start().await;
    mount_product(&server).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "operationName": "CreateCart" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_create_response(2)))
        .expect(1)
        .mount(&server)
        .await;

    let app = test_app(&server.uri());
    let cookie = add_to_cart(&app).await;

    tokio::time::sleep(larder_integration_tests::TEST_DEBOUNCE * 6).await;

    let response = send(&app, get("/api/cart", Some(&cookie))).await;
    let cart: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(cart["sync_pending"], false);
    assert_eq!(cart["sync"]["remote_id"], "gid://shopify/Cart/abc123");
    assert!(cart["sync"]["last_error"].is_null());
}

#[tokio::test]
async fn test_checkout_redirects_to_hosted_checkout() {
    let server = MockServer::start().await;
    mount_product(&server).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "operationName": "CreateCart" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_create_response(2)))
        .mount(&server)
        .await;
    mount_expired_cart(&server).await;

    let app = test_app(&server.uri());
    let cookie = add_to_cart(&app).await;

    let response = send(&app, get("/checkout", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "https://larder-test.myshopify.com/cart/c/abc123"
    );
}

#[tokio::test]
async fn test_repeat_checkout_recreates_expired_backend_cart() {
    let server = MockServer::start().await;
    mount_product(&server).await;
    mount_expired_cart(&server).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "operationName": "CreateCart" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_create_response(2)))
        .expect(2)
        .mount(&server)
        .await;

    let app = test_app(&server.uri());
    let cookie = add_to_cart(&app).await;

    for _ in 0..2 {
        let response = send(&app, get("/checkout", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            "https://larder-test.myshopify.com/cart/c/abc123"
        );
    }
}

#[tokio::test]
async fn test_checkout_falls_back_to_cart_when_backend_fails() {
    let server = MockServer::start().await;
    mount_product(&server).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "operationName": "CreateCart" })))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = test_app(&server.uri());
    let cookie = add_to_cart(&app).await;

    let response = send(&app, get("/checkout", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/cart");
}

#[tokio::test]
async fn test_checkout_with_empty_cart_returns_to_cart() {
    let server = MockServer::start().await;
    let app = test_app(&server.uri());

    let response = send(&app, get("/checkout", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/cart");
}

#[tokio::test]
async fn test_invalid_review_is_unprocessable() {
    let server = MockServer::start().await;
    mount_product(&server).await;

    let app = test_app(&server.uri());
    let response = send(
        &app,
        post_form(
            "/products/rye-flour/reviews",
            "rating=9&title=&body=Nice&name=Alex&email=alex%40example.com",
            None,
            true,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_string(response).await.contains("between 1 and 5"));
}

#[tokio::test]
async fn test_account_pages_require_sign_in() {
    let server = MockServer::start().await;
    let app = test_app(&server.uri());

    for uri in ["/account", "/account/subscriptions"] {
        let response = send(&app, get(uri, None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), "/account/login");
    }
}

#[tokio::test]
async fn test_blog_index_degrades_when_cms_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cms/posts"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let app = test_app(&server.uri());
    let response = send(&app, get("/blog", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

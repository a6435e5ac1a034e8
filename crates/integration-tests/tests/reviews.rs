//! Reviews client fallback chain against a mocked reviews service.

#![allow(clippy::unwrap_used)]

use larder_integration_tests::{review, test_config};
use larder_storefront::services::reviews::ReviewSource;
use larder_storefront::services::{NewReview, ReviewTarget, ReviewsClient};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn target() -> ReviewTarget {
    ReviewTarget {
        handle: "rye-flour".to_string(),
        external_id: Some("1001".to_string()),
    }
}

async fn client(server: &MockServer) -> ReviewsClient {
    ReviewsClient::new(&test_config(&server.uri()).reviews)
}

#[tokio::test]
async fn test_falls_back_to_external_id() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reviews-api/reviews"))
        .and(query_param("product_handle", "rye-flour"))
        .and(query_param("api_token", "reviews_test_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "reviews": [] })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/reviews-api/reviews"))
        .and(query_param("product_external_id", "1001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reviews": [review(1, 5), review(2, 4)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await;
    let summary = client.product_reviews(&target()).await;

    assert_eq!(summary.source, ReviewSource::ExternalId);
    assert_eq!(summary.count, 2);
    assert!((summary.average - 4.5).abs() < f64::EPSILON);

    // Second lookup is served from cache; `expect(1)` checks on drop.
    let cached = client.product_reviews(&target()).await;
    assert_eq!(cached.count, 2);
}

#[tokio::test]
async fn test_widget_is_last_resort() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reviews-api/reviews"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "reviews": [] })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/reviews-api/products/-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "product": { "id": 555 } })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/reviews-api/widgets/product_review"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "widget": "<div data-average-rating='4.5' data-number-of-reviews='3'></div>"
        })))
        .mount(&server)
        .await;

    let summary = client(&server).await.product_reviews(&target()).await;

    assert_eq!(summary.source, ReviewSource::Widget);
    assert_eq!(summary.count, 3);
    assert!(summary.reviews.is_empty());
}

#[tokio::test]
async fn test_outage_yields_uncached_default() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client(&server).await;
    let summary = client.product_reviews(&target()).await;
    assert_eq!(summary.source, ReviewSource::Default);
    assert_eq!(summary.count, 0);

    // Nothing was cached, so the service is asked again.
    let before = server.received_requests().await.unwrap().len();
    client.product_reviews(&target()).await;
    let after = server.received_requests().await.unwrap().len();
    assert!(after > before);
}

#[tokio::test]
async fn test_submit_review_posts_json() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/reviews-api/reviews"))
        .and(wiremock::matchers::body_partial_json(json!({
            "handle": "rye-flour",
            "rating": 5,
            "name": "Alex"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let review = NewReview::validate(
        target(),
        5,
        "Lovely",
        "Makes a great loaf.",
        "Alex",
        "alex@example.com",
    )
    .unwrap();

    client(&server).await.submit_review(&review).await.unwrap();
}

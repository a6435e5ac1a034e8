//! CMS client listing and post lookup against a mocked CMS.

#![allow(clippy::unwrap_used)]

use larder_integration_tests::{cms_post, test_config};
use larder_storefront::services::CmsClient;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_list_posts_drops_drafts() {
    let server = MockServer::start().await;

    let mut draft = cms_post("draft-bread", "2026-09-10T08:00:00Z", &[]);
    draft["status"] = json!("draft");

    Mock::given(method("GET"))
        .and(path("/cms/posts"))
        .and(header("authorization", "Bearer cms_test_token"))
        .and(query_param("status", "published"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "posts": [
                cms_post("older", "2026-08-01T08:00:00Z", &["rye"]),
                draft,
                cms_post("newer", "2026-09-01T08:00:00Z", &["coffee"])
            ],
            "total": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = CmsClient::new(&test_config(&server.uri()).cms);
    let page = client.list_posts(1, 9, None).await.unwrap();

    let slugs: Vec<&str> = page.posts.iter().map(|p| p.slug.as_str()).collect();
    assert_eq!(slugs, ["newer", "older"]);
    assert_eq!(page.total, 2);
    assert!(page.posts[0].content_html.contains("<p>Mix the flour.</p>"));

    // Cached for subsequent requests.
    client.list_posts(1, 9, None).await.unwrap();
}

#[tokio::test]
async fn test_tag_filter_is_forwarded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cms/posts"))
        .and(query_param("tag", "sourdough"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "posts": [cms_post("starter", "2026-08-01T08:00:00Z", &["sourdough"])],
            "total": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = CmsClient::new(&test_config(&server.uri()).cms);
    let page = client.list_posts(1, 9, Some(" sourdough ")).await.unwrap();
    assert_eq!(page.posts.len(), 1);
    assert!(page.posts[0].has_tag("Sourdough"));
}

#[tokio::test]
async fn test_unknown_slug_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cms/posts/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cms/posts/rye-starter"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "post": cms_post("rye-starter", "2026-08-01T08:00:00Z", &["rye"])
        })))
        .mount(&server)
        .await;

    let client = CmsClient::new(&test_config(&server.uri()).cms);
    assert!(client.get_post("missing").await.unwrap().is_none());

    let post = client.get_post("rye-starter").await.unwrap().unwrap();
    assert_eq!(post.title, "Recipe rye-starter");
    assert_eq!(post.author.as_deref(), Some("Sam"));
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = CmsClient::new(&test_config(&server.uri()).cms);
    assert!(client.list_posts(1, 9, None).await.is_err());
}

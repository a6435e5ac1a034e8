//! Product reviews from the external reviews service.
//!
//! The reviews service indexes products in several ways depending on how a
//! product was imported, so [`ReviewsClient::product_reviews`] walks a chain
//! of request shapes and keeps the first one that yields anything:
//!
//! 1. reviews filtered by product handle
//! 2. reviews filtered by the commerce backend's numeric product ID
//! 3. the service's own product ID, resolved from the handle, then its reviews
//! 4. the rendered widget payload (average and count only)
//!
//! When every shape comes back empty or fails, a zeroed summary is returned.
//! Pages never fail because reviews are unavailable.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use larder_core::Email;
use moka::future::Cache;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::ReviewsConfig;

/// Reviews shown on a product page.
pub const RECENT_REVIEWS: usize = 10;

/// Reviews requested per attempt.
const PAGE_SIZE: &str = "100";

#[derive(Debug, Error)]
pub enum ReviewsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    /// A submitted review failed validation.
    #[error("{0}")]
    Invalid(String),
}

// =============================================================================
// Domain types
// =============================================================================

/// Which request shape produced a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSource {
    Handle,
    ExternalId,
    ResolvedProduct,
    Widget,
    #[default]
    Default,
}

/// The product whose reviews are wanted.
#[derive(Debug, Clone)]
pub struct ReviewTarget {
    pub handle: String,
    /// Numeric product ID in the commerce backend.
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: u64,
    pub title: Option<String>,
    pub body: String,
    pub rating: u8,
    pub reviewer_name: String,
    pub created_at: DateTime<Utc>,
    pub verified_buyer: bool,
}

/// Star breakdown row for templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistogramRow {
    pub stars: u8,
    pub count: u64,
    /// Share of all reviews, rounded to whole percent.
    pub percent: u8,
}

/// Aggregated reviews for one product.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewSummary {
    /// Mean rating rounded to one decimal; 0.0 without reviews.
    pub average: f64,
    pub count: u64,
    /// `histogram[n]` counts `n + 1` star reviews.
    pub histogram: [u64; 5],
    /// Newest first, at most [`RECENT_REVIEWS`].
    pub reviews: Vec<Review>,
    pub source: ReviewSource,
}

impl ReviewSummary {
    /// Aggregate visible reviews.
    #[must_use]
    pub fn from_reviews(reviews: Vec<Review>, source: ReviewSource) -> Self {
        let mut reviews: Vec<Review> = reviews
            .into_iter()
            .filter(|r| (1..=5).contains(&r.rating))
            .collect();

        let mut histogram = [0u64; 5];
        let mut total = 0u64;
        for review in &reviews {
            if let Some(slot) = histogram.get_mut(usize::from(review.rating - 1)) {
                *slot += 1;
            }
            total += u64::from(review.rating);
        }

        let count = reviews.len() as u64;
        #[allow(clippy::cast_precision_loss)]
        let average = if count == 0 {
            0.0
        } else {
            round_one_decimal(total as f64 / count as f64)
        };

        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reviews.truncate(RECENT_REVIEWS);

        Self {
            average,
            count,
            histogram,
            reviews,
            source,
        }
    }

    /// Whether the summary carries any review data.
    #[must_use]
    pub const fn has_reviews(&self) -> bool {
        self.count > 0
    }

    /// Rows from 5 stars down to 1.
    #[must_use]
    pub fn histogram_rows(&self) -> Vec<HistogramRow> {
        let known: u64 = self.histogram.iter().sum();
        (1..=5u8)
            .rev()
            .map(|stars| {
                let count = self
                    .histogram
                    .get(usize::from(stars - 1))
                    .copied()
                    .unwrap_or(0);
                let percent = if known == 0 {
                    0
                } else {
                    u8::try_from((count * 100 + known / 2) / known).unwrap_or(100)
                };
                HistogramRow {
                    stars,
                    count,
                    percent,
                }
            })
            .collect()
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// A validated review ready to post.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub target: ReviewTarget,
    pub rating: u8,
    pub title: Option<String>,
    pub body: String,
    pub name: String,
    pub email: Email,
}

impl NewReview {
    /// Validate raw form input.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` with a customer-facing message.
    pub fn validate(
        target: ReviewTarget,
        rating: u8,
        title: &str,
        body: &str,
        name: &str,
        email: &str,
    ) -> Result<Self, ReviewsError> {
        if !(1..=5).contains(&rating) {
            return Err(ReviewsError::Invalid(
                "Rating must be between 1 and 5 stars".to_string(),
            ));
        }
        let body = body.trim();
        if body.is_empty() {
            return Err(ReviewsError::Invalid("Review text is required".to_string()));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(ReviewsError::Invalid("Name is required".to_string()));
        }
        let email = Email::parse(email)
            .map_err(|_| ReviewsError::Invalid("Enter a valid email address".to_string()))?;
        let title = Some(title.trim()).filter(|t| !t.is_empty()).map(String::from);

        Ok(Self {
            target,
            rating,
            title,
            body: body.to_string(),
            name: name.to_string(),
            email,
        })
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ReviewsPage {
    #[serde(default)]
    reviews: Vec<WireReview>,
}

#[derive(Debug, Deserialize)]
struct WireReview {
    id: u64,
    title: Option<String>,
    #[serde(default)]
    body: String,
    rating: u8,
    reviewer: Option<WireReviewer>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    hidden: bool,
    #[serde(default = "default_true")]
    published: bool,
    verified: Option<String>,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct WireReviewer {
    name: Option<String>,
}

impl WireReview {
    fn is_visible(&self) -> bool {
        !self.hidden && self.published
    }

    fn into_review(self) -> Review {
        Review {
            id: self.id,
            title: self.title.filter(|t| !t.trim().is_empty()),
            body: self.body,
            rating: self.rating,
            reviewer_name: self
                .reviewer
                .and_then(|r| r.name)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Anonymous".to_string()),
            created_at: self.created_at,
            verified_buyer: self.verified.as_deref() == Some("buyer"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProductLookup {
    product: ProductRef,
}

#[derive(Debug, Deserialize)]
struct ProductRef {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct WidgetPayload {
    #[serde(default)]
    widget: String,
}

static AVERAGE_RATING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-average-rating=['"]([0-9.]+)['"]"#).expect("valid average regex")
});

static REVIEW_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-number-of-reviews=['"]([0-9]+)['"]"#).expect("valid count regex")
});

/// Pull average and count out of the widget's data attributes.
fn parse_widget(html: &str) -> Option<(f64, u64)> {
    let average: f64 = AVERAGE_RATING_RE.captures(html)?.get(1)?.as_str().parse().ok()?;
    let count: u64 = REVIEW_COUNT_RE.captures(html)?.get(1)?.as_str().parse().ok()?;
    Some((round_one_decimal(average), count))
}

// =============================================================================
// ReviewsClient
// =============================================================================

/// Client for the reviews service. Cheap to clone.
#[derive(Clone)]
pub struct ReviewsClient {
    inner: Arc<ReviewsClientInner>,
}

struct ReviewsClientInner {
    client: reqwest::Client,
    base_url: String,
    api_token: SecretString,
    shop_domain: String,
    cache: Cache<String, ReviewSummary>,
}

impl ReviewsClient {
    #[must_use]
    pub fn new(config: &ReviewsConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(5000)
            .time_to_live(Duration::from_secs(600))
            .build();

        Self {
            inner: Arc::new(ReviewsClientInner {
                client: reqwest::Client::new(),
                base_url: config.api_url.clone(),
                api_token: config.api_token.clone(),
                shop_domain: config.shop_domain.clone(),
                cache,
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ReviewsError> {
        let response = self
            .inner
            .client
            .get(format!("{}{path}", self.inner.base_url))
            .query(&[
                ("api_token", self.inner.api_token.expose_secret()),
                ("shop_domain", self.inner.shop_domain.as_str()),
            ])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ReviewsError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ReviewsError::Parse(e.to_string()))
    }

    async fn reviews_where(&self, filter: (&str, &str)) -> Result<Vec<Review>, ReviewsError> {
        let page: ReviewsPage = self
            .get_json("/reviews", &[filter, ("per_page", PAGE_SIZE)])
            .await?;
        Ok(page
            .reviews
            .into_iter()
            .filter(WireReview::is_visible)
            .map(WireReview::into_review)
            .collect())
    }

    /// Run one request shape. `Ok(None)` means it answered but had nothing.
    async fn attempt(
        &self,
        source: ReviewSource,
        target: &ReviewTarget,
    ) -> Result<Option<ReviewSummary>, ReviewsError> {
        let summary = match source {
            ReviewSource::Handle => {
                let reviews = self
                    .reviews_where(("product_handle", target.handle.as_str()))
                    .await?;
                ReviewSummary::from_reviews(reviews, source)
            }
            ReviewSource::ExternalId => {
                let Some(external_id) = &target.external_id else {
                    return Ok(None);
                };
                let reviews = self
                    .reviews_where(("product_external_id", external_id.as_str()))
                    .await?;
                ReviewSummary::from_reviews(reviews, source)
            }
            ReviewSource::ResolvedProduct => {
                let lookup: ProductLookup = self
                    .get_json("/products/-1", &[("handle", target.handle.as_str())])
                    .await?;
                let product_id = lookup.product.id.to_string();
                let reviews = self.reviews_where(("product_id", product_id.as_str())).await?;
                ReviewSummary::from_reviews(reviews, source)
            }
            ReviewSource::Widget => {
                let payload: WidgetPayload = self
                    .get_json("/widgets/product_review", &[("handle", target.handle.as_str())])
                    .await?;
                let Some((average, count)) = parse_widget(&payload.widget) else {
                    return Ok(None);
                };
                ReviewSummary {
                    average,
                    count,
                    source,
                    ..ReviewSummary::default()
                }
            }
            ReviewSource::Default => return Ok(None),
        };

        Ok(summary.has_reviews().then_some(summary))
    }

    /// Reviews for a product, never failing.
    ///
    /// Found summaries are cached for 10 minutes. The zeroed default is cached
    /// only when every request shape answered successfully with nothing.
    #[instrument(skip(self), fields(handle = %target.handle))]
    pub async fn product_reviews(&self, target: &ReviewTarget) -> ReviewSummary {
        if let Some(summary) = self.inner.cache.get(&target.handle).await {
            debug!("Cache hit for reviews");
            return summary;
        }

        let mut failed = false;
        for source in [
            ReviewSource::Handle,
            ReviewSource::ExternalId,
            ReviewSource::ResolvedProduct,
            ReviewSource::Widget,
        ] {
            match self.attempt(source, target).await {
                Ok(Some(summary)) => {
                    debug!(?source, count = summary.count, "Reviews found");
                    self.inner
                        .cache
                        .insert(target.handle.clone(), summary.clone())
                        .await;
                    return summary;
                }
                Ok(None) => debug!(?source, "No reviews from source"),
                Err(e) => {
                    failed = true;
                    warn!(?source, error = %e, "Reviews request failed");
                }
            }
        }

        let summary = ReviewSummary::default();
        if !failed {
            self.inner
                .cache
                .insert(target.handle.clone(), summary.clone())
                .await;
        }
        summary
    }

    /// Post a new review. It appears once the service publishes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it.
    #[instrument(
        skip(self, review),
        fields(handle = %review.target.handle, rating = review.rating)
    )]
    pub async fn submit_review(&self, review: &NewReview) -> Result<(), ReviewsError> {
        let body = serde_json::json!({
            "api_token": self.inner.api_token.expose_secret(),
            "shop_domain": self.inner.shop_domain,
            "platform": "shopify",
            "id": review.target.external_id,
            "handle": review.target.handle,
            "name": review.name,
            "email": review.email.as_str(),
            "rating": review.rating,
            "title": review.title,
            "body": review.body,
        });

        let response = self
            .inner
            .client
            .post(format!("{}/reviews", self.inner.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ReviewsError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        self.inner.cache.invalidate(&review.target.handle).await;
        Ok(())
    }
}

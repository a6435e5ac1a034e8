//! Subscription billing client.
//!
//! The billing service authenticates machine clients with the OAuth
//! client-credentials grant and takes form-encoded bodies everywhere. The
//! storefront only lists a customer's subscriptions and lets them pause or
//! resume one; plan changes and cancellations stay in the vendor portal.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use larder_core::{Email, Price, SubscriptionStatus};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::config::BillingConfig;

/// Subscriptions requested per search.
const SEARCH_LIMIT: &str = "50";

/// Seconds before expiry at which a token is treated as expired.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Subscription not found")]
    NotFound,

    #[error("Cannot {action} a subscription that is {status}")]
    InvalidTransition {
        status: SubscriptionStatus,
        action: &'static str,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}

// =============================================================================
// Domain types
// =============================================================================

/// A customer's subscription as shown on the account page.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Subscription {
    pub id: String,
    pub customer_email: String,
    pub status: SubscriptionStatus,
    pub plan_name: String,
    pub product_title: Option<String>,
    pub price: Option<Price>,
    /// Human-readable cadence, e.g. "every 2 weeks".
    pub interval: Option<String>,
    pub next_billing_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Subscription {
    #[must_use]
    pub const fn can_suspend(&self) -> bool {
        self.status.can_suspend()
    }

    #[must_use]
    pub const fn can_resume(&self) -> bool {
        self.status.can_resume()
    }
}

/// Cached OAuth access token.
#[derive(Debug, Clone)]
struct AccessToken {
    value: SecretString,
    /// Unix timestamp.
    expires_at: i64,
}

impl AccessToken {
    /// Token issued at `now` that lives for `expires_in` seconds.
    fn issued(value: String, now: i64, expires_in: i64) -> Self {
        Self {
            value: SecretString::from(value),
            expires_at: now.saturating_add(expires_in),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

const fn default_expires_in() -> i64 {
    3600
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Vendors emit IDs as numbers or strings depending on the endpoint.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(u64),
    Text(String),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    subscriptions: Vec<WireSubscription>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionResponse {
    subscription: WireSubscription,
}

#[derive(Debug, Deserialize)]
struct WireSubscription {
    id: WireId,
    #[serde(default)]
    customer_email: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    plan_name: Option<String>,
    #[serde(default)]
    product_title: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    interval: Option<String>,
    #[serde(default)]
    interval_count: Option<u32>,
    #[serde(default)]
    next_billing_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl WireSubscription {
    fn into_subscription(self) -> Subscription {
        let price = match (self.price.as_deref(), self.currency.as_deref()) {
            (Some(amount), Some(currency)) => Price::parse(amount, currency)
                .inspect_err(|e| warn!(error = %e, "Unparseable subscription price"))
                .ok(),
            _ => None,
        };

        Subscription {
            id: self.id.into_string(),
            customer_email: self.customer_email,
            status: SubscriptionStatus::from_vendor(&self.status),
            plan_name: self
                .plan_name
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| "Subscription".to_string()),
            product_title: self.product_title,
            price,
            interval: self
                .interval
                .map(|unit| describe_interval(&unit, self.interval_count.unwrap_or(1))),
            next_billing_at: self.next_billing_at,
            created_at: self.created_at,
        }
    }
}

/// "week", 2 -> "every 2 weeks".
fn describe_interval(unit: &str, count: u32) -> String {
    let unit = unit.trim().to_lowercase();
    let unit = unit.strip_suffix('s').unwrap_or(&unit);
    match count {
        0 | 1 => format!("every {unit}"),
        n => format!("every {n} {unit}s"),
    }
}

// =============================================================================
// BillingClient
// =============================================================================

/// Client for the subscription billing API. Cheap to clone.
#[derive(Clone)]
pub struct BillingClient {
    inner: Arc<BillingClientInner>,
}

struct BillingClientInner {
    client: reqwest::Client,
    api_url: String,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    scope: Option<String>,
    token: RwLock<Option<AccessToken>>,
}

impl BillingClient {
    /// Create a client. No token is requested until the first call.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(config: &BillingConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            inner: Arc::new(BillingClientInner {
                client,
                api_url: config.api_url.clone(),
                token_url: config.token_url.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                scope: config.scope.clone(),
                token: RwLock::new(None),
            }),
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Current access token, requesting a new one when missing or expiring.
    async fn access_token(&self) -> Result<SecretString, BillingError> {
        {
            let guard = self.inner.token.read().await;
            if let Some(token) = guard.as_ref().filter(|t| !t.is_expired()) {
                return Ok(token.value.clone());
            }
        }

        let mut guard = self.inner.token.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(token) = guard.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.value.clone());
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.inner.token.write().await = None;
    }

    #[instrument(skip(self))]
    async fn request_token(&self) -> Result<AccessToken, BillingError> {
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.expose_secret()),
        ];
        if let Some(scope) = &self.inner.scope {
            form.push(("scope", scope.as_str()));
        }

        let now = Utc::now().timestamp();
        let response = self
            .inner
            .client
            .post(&self.inner.token_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: Option<TokenErrorResponse> = response.json().await.ok();
            let message = body
                .and_then(|b| b.error_description.or(b.error))
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(BillingError::Auth(message));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BillingError::Parse(e.to_string()))?;
        debug!(expires_in = token.expires_in, "Obtained billing access token");

        Ok(AccessToken::issued(token.access_token, now, token.expires_in))
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// POST a form and decode the JSON answer.
    ///
    /// A 401 drops the cached token and the request is retried once.
    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T, BillingError> {
        let url = format!("{}{path}", self.inner.api_url);
        let mut retried = false;

        loop {
            let token = self.access_token().await?;
            let response = self
                .inner
                .client
                .post(&url)
                .bearer_auth(token.expose_secret())
                .form(form)
                .send()
                .await?;

            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.invalidate_token().await;
                if retried {
                    return Err(BillingError::Auth(
                        "Billing API rejected a fresh access token".to_string(),
                    ));
                }
                debug!(path, "Billing token rejected, retrying with a new one");
                retried = true;
                continue;
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(BillingError::NotFound);
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(BillingError::Api {
                    status: status.as_u16(),
                    message: message.chars().take(200).collect(),
                });
            }

            return response
                .json()
                .await
                .map_err(|e| BillingError::Parse(e.to_string()));
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// All subscriptions registered to an email address.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the search request fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn find_subscriptions(
        &self,
        email: &Email,
    ) -> Result<Vec<Subscription>, BillingError> {
        let response: SearchResponse = self
            .post_form(
                "/subscriptions/search",
                &[("customer_email", email.as_str()), ("limit", SEARCH_LIMIT)],
            )
            .await?;

        Ok(response
            .subscriptions
            .into_iter()
            .map(WireSubscription::into_subscription)
            .filter(|s| email.matches(&s.customer_email))
            .collect())
    }

    /// Look a subscription up among the customer's own.
    ///
    /// Someone else's subscription is reported as `NotFound`.
    async fn owned_subscription(
        &self,
        email: &Email,
        subscription_id: &str,
    ) -> Result<Subscription, BillingError> {
        self.find_subscriptions(email)
            .await?
            .into_iter()
            .find(|s| s.id == subscription_id)
            .ok_or(BillingError::NotFound)
    }

    /// Pause an active subscription.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the customer has no such subscription,
    /// `InvalidTransition` if it is not active, or an API error.
    #[instrument(skip(self, reason), fields(email = %email))]
    pub async fn suspend(
        &self,
        email: &Email,
        subscription_id: &str,
        reason: Option<&str>,
    ) -> Result<Subscription, BillingError> {
        let subscription = self.owned_subscription(email, subscription_id).await?;
        if !subscription.can_suspend() {
            return Err(BillingError::InvalidTransition {
                status: subscription.status,
                action: "pause",
            });
        }

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("Paused by customer");
        let path = format!(
            "/subscriptions/{}/suspend",
            urlencoding::encode(subscription_id)
        );
        let response: SubscriptionResponse = self.post_form(&path, &[("reason", reason)]).await?;
        Ok(response.subscription.into_subscription())
    }

    /// Resume a paused subscription.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the customer has no such subscription,
    /// `InvalidTransition` if it is not paused, or an API error.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn resume(
        &self,
        email: &Email,
        subscription_id: &str,
    ) -> Result<Subscription, BillingError> {
        let subscription = self.owned_subscription(email, subscription_id).await?;
        if !subscription.can_resume() {
            return Err(BillingError::InvalidTransition {
                status: subscription.status,
                action: "resume",
            });
        }

        let path = format!(
            "/subscriptions/{}/resume",
            urlencoding::encode(subscription_id)
        );
        let response: SubscriptionResponse = self.post_form(&path, &[]).await?;
        Ok(response.subscription.into_subscription())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiry_margin() {
        let now = Utc::now().timestamp();
        let fresh = AccessToken {
            value: SecretString::from("t"),
            expires_at: now + 3600,
        };
        assert!(!fresh.is_expired());

        let nearly = AccessToken {
            value: SecretString::from("t"),
            expires_at: now + 30,
        };
        assert!(nearly.is_expired());
    }

    #[test]
    fn test_token_lifetime_saturates() {
        let now = Utc::now().timestamp();
        let forever = AccessToken::issued("t".to_string(), now, i64::MAX);
        assert_eq!(forever.expires_at, i64::MAX);
        assert!(!forever.is_expired());

        let bogus = AccessToken::issued("t".to_string(), now, i64::MIN);
        assert!(bogus.is_expired());
    }

    #[test]
    fn test_describe_interval() {
        assert_eq!(describe_interval("month", 1), "every month");
        assert_eq!(describe_interval("weeks", 2), "every 2 weeks");
        assert_eq!(describe_interval("Day", 0), "every day");
        assert_eq!(describe_interval(" MONTHS ", 3), "every 3 months");
        assert_eq!(describe_interval("year", 2), "every 2 years");
    }

    #[test]
    fn test_wire_subscription_conversion() {
        let response: SearchResponse = serde_json::from_value(serde_json::json!({
            "subscriptions": [
                {
                    "id": 42,
                    "customer_email": "Jo@Example.com",
                    "status": "paused",
                    "plan_name": "Sourdough Club",
                    "price": "18.00",
                    "currency": "USD",
                    "interval": "week",
                    "interval_count": 2,
                    "next_billing_at": "2026-11-01T00:00:00Z"
                },
                {"id": "sub_9", "status": "mystery"}
            ]
        }))
        .unwrap();

        let subs: Vec<Subscription> = response
            .subscriptions
            .into_iter()
            .map(WireSubscription::into_subscription)
            .collect();

        assert_eq!(subs[0].id, "42");
        assert_eq!(subs[0].status, SubscriptionStatus::Suspended);
        assert!(subs[0].can_resume());
        assert_eq!(subs[0].price.as_ref().unwrap().display(), "$18.00");
        assert_eq!(subs[0].interval.as_deref(), Some("every 2 weeks"));

        assert_eq!(subs[1].id, "sub_9");
        assert_eq!(subs[1].status, SubscriptionStatus::Unknown);
        assert_eq!(subs[1].plan_name, "Subscription");
        assert!(subs[1].price.is_none());
        assert!(!subs[1].can_suspend());
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = BillingError::InvalidTransition {
            status: SubscriptionStatus::Cancelled,
            action: "resume",
        };
        assert_eq!(
            err.to_string(),
            "Cannot resume a subscription that is Cancelled"
        );
    }
}

//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `SHOPIFY_STORE` - Shopify store domain (e.g., your-store.myshopify.com)
//! - `SHOPIFY_STOREFRONT_PRIVATE_TOKEN` - Storefront API private access token
//! - `CMS_API_URL` - Headless CMS REST base URL
//! - `CMS_API_TOKEN` - Headless CMS read token
//! - `REVIEWS_API_URL` - Reviews service REST base URL
//! - `REVIEWS_API_TOKEN` - Reviews service API token
//! - `REVIEWS_SHOP_DOMAIN` - Shop domain registered with the reviews service
//! - `BILLING_API_URL` - Subscription billing REST base URL
//! - `BILLING_TOKEN_URL` - Billing OAuth token endpoint
//! - `BILLING_CLIENT_ID` - Billing OAuth client ID
//! - `BILLING_CLIENT_SECRET` - Billing OAuth client secret
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `SHOPIFY_API_VERSION` - API version (default: 2026-01)
//! - `SHOPIFY_STOREFRONT_ENDPOINT` - Full GraphQL endpoint override (staging proxies)
//! - `BILLING_SCOPE` - OAuth scope requested with the client-credentials grant
//! - `CART_SYNC_DEBOUNCE_MS` - Delay before a cart change is pushed to Shopify (default: 500)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;
const DEFAULT_CART_SYNC_DEBOUNCE_MS: u64 = 500;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Shopify Storefront API configuration
    pub shopify: ShopifyStorefrontConfig,
    /// Headless CMS configuration
    pub cms: CmsConfig,
    /// Reviews service configuration
    pub reviews: ReviewsConfig,
    /// Subscription billing configuration
    pub billing: BillingConfig,
    /// Cart behaviour
    pub cart: CartConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Shopify Storefront API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct ShopifyStorefrontConfig {
    /// Shopify store domain (e.g., your-store.myshopify.com)
    pub store: String,
    /// Shopify API version (e.g., 2026-01)
    pub api_version: String,
    /// Storefront API private access token (server-side only)
    pub storefront_private_token: SecretString,
    /// Full endpoint override; derived from `store` when unset
    pub endpoint_override: Option<String>,
}

impl ShopifyStorefrontConfig {
    /// GraphQL endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> String {
        self.endpoint_override.clone().unwrap_or_else(|| {
            format!(
                "https://{}/api/{}/graphql.json",
                self.store, self.api_version
            )
        })
    }
}

impl std::fmt::Debug for ShopifyStorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyStorefrontConfig")
            .field("store", &self.store)
            .field("api_version", &self.api_version)
            .field("storefront_private_token", &"[REDACTED]")
            .field("endpoint_override", &self.endpoint_override)
            .finish()
    }
}

/// Headless CMS configuration.
#[derive(Clone)]
pub struct CmsConfig {
    /// REST base URL (e.g., `https://cms.example.com/api`)
    pub api_url: String,
    /// Bearer token with read access to published posts
    pub api_token: SecretString,
}

impl std::fmt::Debug for CmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmsConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &"[REDACTED]")
            .finish()
    }
}

/// Reviews service configuration.
#[derive(Clone)]
pub struct ReviewsConfig {
    /// REST base URL (e.g., `https://reviews.example.com/api/v1`)
    pub api_url: String,
    /// API token sent as the `api_token` query parameter
    pub api_token: SecretString,
    /// Shop domain sent as the `shop_domain` query parameter
    pub shop_domain: String,
}

impl std::fmt::Debug for ReviewsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewsConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &"[REDACTED]")
            .field("shop_domain", &self.shop_domain)
            .finish()
    }
}

/// Subscription billing configuration.
#[derive(Clone)]
pub struct BillingConfig {
    /// REST base URL
    pub api_url: String,
    /// OAuth token endpoint
    pub token_url: String,
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
    /// Optional OAuth scope
    pub scope: Option<String>,
}

impl std::fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingConfig")
            .field("api_url", &self.api_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Cart configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// How long a cart must stay unchanged before it is pushed to Shopify.
    pub sync_debounce: Duration,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            sync_debounce: Duration::from_millis(DEFAULT_CART_SYNC_DEBOUNCE_MS),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            host,
            port,
            base_url,
            shopify: ShopifyStorefrontConfig::from_env()?,
            cms: CmsConfig::from_env()?,
            reviews: ReviewsConfig::from_env()?,
            billing: BillingConfig::from_env()?,
            cart: CartConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl ShopifyStorefrontConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            store: get_required_env("SHOPIFY_STORE")?,
            api_version: get_env_or_default("SHOPIFY_API_VERSION", "2026-01"),
            storefront_private_token: get_validated_secret("SHOPIFY_STOREFRONT_PRIVATE_TOKEN")?,
            endpoint_override: get_optional_env("SHOPIFY_STOREFRONT_ENDPOINT"),
        })
    }
}

impl CmsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: get_required_url("CMS_API_URL")?,
            api_token: get_validated_secret("CMS_API_TOKEN")?,
        })
    }
}

impl ReviewsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: get_required_url("REVIEWS_API_URL")?,
            api_token: get_validated_secret("REVIEWS_API_TOKEN")?,
            shop_domain: get_required_env("REVIEWS_SHOP_DOMAIN")?,
        })
    }
}

impl BillingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: get_required_url("BILLING_API_URL")?,
            token_url: get_required_url("BILLING_TOKEN_URL")?,
            client_id: get_required_env("BILLING_CLIENT_ID")?,
            client_secret: get_validated_secret("BILLING_CLIENT_SECRET")?,
            scope: get_optional_env("BILLING_SCOPE"),
        })
    }
}

impl CartConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let millis: u64 = parse_env(
            "CART_SYNC_DEBOUNCE_MS",
            &DEFAULT_CART_SYNC_DEBOUNCE_MS.to_string(),
        )?;
        Ok(Self {
            sync_debounce: Duration::from_millis(millis),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable that must parse as a URL.
///
/// Trailing slashes are trimmed so clients can append paths directly.
fn get_required_url(key: &str) -> Result<String, ConfigError> {
    let value = get_required_env(key)?;
    url::Url::parse(&value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    Ok(value.trim_end_matches('/').to_string())
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    // Vendor API tokens are long random strings
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= \
                 {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the token from the vendor dashboard."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shopify_config() -> ShopifyStorefrontConfig {
        ShopifyStorefrontConfig {
            store: "larder-test.myshopify.com".to_string(),
            api_version: "2026-01".to_string(),
            storefront_private_token: SecretString::from("shpat_super_secret_private"),
            endpoint_override: None,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("sk_live_9fQ2mZr7LxP4tB8wK1nV", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_shopify_endpoint_derived_from_store() {
        assert_eq!(
            shopify_config().endpoint(),
            "https://larder-test.myshopify.com/api/2026-01/graphql.json"
        );
    }

    #[test]
    fn test_shopify_endpoint_override() {
        let config = ShopifyStorefrontConfig {
            endpoint_override: Some("http://127.0.0.1:9000/graphql".to_string()),
            ..shopify_config()
        };
        assert_eq!(config.endpoint(), "http://127.0.0.1:9000/graphql");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let shopify = format!("{:?}", shopify_config());
        assert!(shopify.contains("larder-test.myshopify.com"));
        assert!(shopify.contains("[REDACTED]"));
        assert!(!shopify.contains("shpat_super_secret_private"));

        let billing = BillingConfig {
            api_url: "https://billing.test/api".to_string(),
            token_url: "https://billing.test/oauth/token".to_string(),
            client_id: "client-123".to_string(),
            client_secret: SecretString::from("billing_secret_value"),
            scope: None,
        };
        let billing = format!("{billing:?}");
        assert!(billing.contains("client-123"));
        assert!(!billing.contains("billing_secret_value"));
    }

    #[test]
    fn test_cart_config_default_debounce() {
        assert_eq!(
            CartConfig::default().sync_debounce,
            Duration::from_millis(500)
        );
    }
}

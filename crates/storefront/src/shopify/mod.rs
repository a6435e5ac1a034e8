//! Commerce backend client (Shopify Storefront API).
//!
//! # Architecture
//!
//! - Operations implement `graphql_client::GraphQLQuery`; documents live in
//!   `graphql/storefront/`
//! - The backend is the source of truth for catalog, carts and customers
//! - Product and collection reads are cached via `moka` (5 minute TTL); cart
//!   and customer calls always go to the API
//!
//! # Example
//!
//! ```rust,ignore
//! use larder_storefront::shopify::{CartLineInput, StorefrontClient};
//!
//! let client = StorefrontClient::new(&config.shopify);
//! let product = client.get_product_by_handle("stoneground-rye").await?;
//! let cart = client
//!     .create_cart(vec![CartLineInput {
//!         merchandise_id: product.variants[0].id.clone(),
//!         quantity: 1,
//!         selling_plan_id: None,
//!     }])
//!     .await?;
//! ```

mod storefront;
pub mod types;

pub use storefront::StorefrontClient;
pub use types::*;

use thiserror::Error;

/// Errors that can occur when talking to the commerce backend.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// A mutation rejected its input.
    #[error("User error: {0}")]
    UserError(String),
}

impl ShopifyError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Build a `UserError` from mutation `userErrors`.
    pub(crate) fn from_user_errors(errors: &[UserError]) -> Self {
        Self::UserError(
            errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// A GraphQL error returned by the API.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    pub message: String,
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the failing field (keys and list indices).
    pub path: Vec<serde_json::Value>,
}

/// Location in a GraphQL document (1-indexed).
#[derive(Debug, Clone)]
pub struct GraphQLErrorLocation {
    pub line: i64,
    pub column: i64,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut parts = Vec::new();

            if !e.message.is_empty() {
                parts.push(e.message.clone());
            }

            if !e.path.is_empty() {
                let path = e
                    .path
                    .iter()
                    .map(|p| match p {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".");
                parts.push(format!("path: {path}"));
            }

            if let Some(loc) = e.locations.first() {
                parts.push(format!("at line {}:{}", loc.line, loc.column));
            }

            if parts.is_empty() {
                format!("[error {}]: (no details)", i + 1)
            } else {
                parts.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

//! Application state shared across handlers.

use std::sync::Arc;

use crate::cart::CartSyncer;
use crate::config::StorefrontConfig;
use crate::content::ContentStore;
use crate::services::{BillingClient, CmsClient, ReviewsClient};
use crate::shopify::StorefrontClient;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; every vendor client inside is itself a
/// cloneable handle over shared connection pools and caches.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    storefront: StorefrontClient,
    cart_sync: CartSyncer<StorefrontClient>,
    reviews: ReviewsClient,
    billing: BillingClient,
    cms: CmsClient,
    content: ContentStore,
}

impl AppState {
    /// Build every vendor client from configuration.
    #[must_use]
    pub fn new(config: StorefrontConfig, content: ContentStore) -> Self {
        let storefront = StorefrontClient::new(&config.shopify);
        let cart_sync = CartSyncer::new(storefront.clone(), config.cart.sync_debounce);
        let reviews = ReviewsClient::new(&config.reviews);
        let billing = BillingClient::new(&config.billing);
        let cms = CmsClient::new(&config.cms);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                storefront,
                cart_sync,
                reviews,
                billing,
                cms,
                content,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Commerce backend client.
    #[must_use]
    pub fn storefront(&self) -> &StorefrontClient {
        &self.inner.storefront
    }

    #[must_use]
    pub fn cart_sync(&self) -> &CartSyncer<StorefrontClient> {
        &self.inner.cart_sync
    }

    #[must_use]
    pub fn reviews(&self) -> &ReviewsClient {
        &self.inner.reviews
    }

    #[must_use]
    pub fn billing(&self) -> &BillingClient {
        &self.inner.billing
    }

    #[must_use]
    pub fn cms(&self) -> &CmsClient {
        &self.inner.cms
    }

    /// Static pages loaded at startup.
    #[must_use]
    pub fn content(&self) -> &ContentStore {
        &self.inner.content
    }
}
